//! エラー型
//!
//! 算術エラー（`ArithError`）はロジック上のバグを示すもので、再試行しない。
//! 探索全体は `SieveError` で報告し、1つでも失敗すれば探索は中止する。

use std::io;

use thiserror::Error;

/// 固定幅整数演算のエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArithError {
    /// スカラー引数が 2^32 以上
    #[error("operand {value} is outside the 32-bit scalar range")]
    OutOfRange { value: u64 },

    /// 値が 256 ビットに収まらない
    #[error("value does not fit in 256 bits")]
    Overflow,

    #[error("invalid decimal digit {digit:?}")]
    InvalidDigit { digit: char },

    #[error("empty decimal string")]
    EmptyInput,

    #[error("division by zero")]
    DivideByZero,

    /// キャリー/ボローが作業ウィンドウの外に漏れた（商の見積もり過大）
    #[error("arithmetic invariant violated: {context}")]
    InvariantViolation { context: &'static str },
}

/// ループアクセラレータ記述子の読み込み・検証エラー
#[derive(Debug, Error)]
pub enum AcceleratorError {
    #[error("cannot read accelerator file: {0}")]
    Io(#[from] io::Error),

    #[error("malformed accelerator JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("accelerator has an empty cycle (length 0)")]
    EmptyCycle,

    #[error("accelerator index list is empty")]
    NoIndices,

    #[error("accelerator index #{position} ({index}) is not greater than its predecessor")]
    NotIncreasing { position: usize, index: u64 },

    #[error("accelerator index #{position} ({index}) exceeds cycle length {length}")]
    OutOfCycle { position: usize, index: u64, length: u64 },
}

/// 上限文字列（"10G" など）のデコードエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("limit \"{0}\" has no leading digits")]
    NoDigits(String),

    #[error("unrecognized limit suffix '{suffix}' in \"{input}\"")]
    BadSuffix { input: String, suffix: char },

    #[error("limit \"{0}\" does not fit in 64 bits")]
    Overflow(String),
}

/// 探索エンジンのエラー
#[derive(Debug, Error)]
pub enum SieveError {
    #[error(transparent)]
    Arith(#[from] ArithError),

    #[error(transparent)]
    Accelerator(#[from] AcceleratorError),

    #[error("invalid search parameters: {0}")]
    InvalidParams(String),

    #[error("cannot build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("worker {id} failed: {source}")]
    WorkerFailed { id: usize, source: ArithError },

    #[error("results channel closed after {received} of {expected} workers reported")]
    ResultsClosed { received: usize, expected: usize },

    #[error("search cancelled")]
    Cancelled,

    /// 参照実装との照合で解が一致しない
    #[error("{found} solutions found, reference has {expected}")]
    ReferenceMismatch { found: usize, expected: usize },

    #[error("cannot write results: {0}")]
    Io(#[from] io::Error),

    #[error("cannot serialize results: {0}")]
    Json(#[from] serde_json::Error),
}
