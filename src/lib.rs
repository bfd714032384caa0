//! 全偶数桁となる 2 のべき乗の篩探索
//!
//! 2^n の下位 d 桁（d ≤ 77）がすべて偶数になる n を探す。
//! 256 ビット固定幅の剰余演算（[`wide`]）と、下位桁の周期から候補を絞る
//! ループアクセラレータ（[`accelerator`]）を組み合わせ、
//! 有界チャネルで結んだ生産者/ワーカー構成（[`sieve`]）で並列に走査する。

pub mod accelerator;
pub mod error;
pub mod limit;
pub mod modpow;
pub mod reference;
pub mod sieve;
pub mod wide;

pub use accelerator::LoopAccelerator;
pub use error::{AcceleratorError, ArithError, LimitError, SieveError};
pub use limit::{decode_limit, format_limit};
pub use modpow::{pow_mod, pow_mod_u64, PowerTable};
pub use reference::{brute_force_solutions, first_odd_digit_big, reference_solutions};
pub use sieve::{
    first_odd_digit, lead_in_solutions, search, search_cancellable, search_sequential, Configuration, Record,
    SearchParams, SearchReport, WorkerResult,
};
pub use wide::{DoubleWide, Wide, BITS, LIMBS, MAX_DECIMAL_DIGITS};
