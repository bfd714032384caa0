//! 全偶数桁となる 2^n の篩探索。
//!
//! 2^n を 10^d を法として計算し、下位 d 桁がすべて偶数かを調べる。
//! ループアクセラレータの候補位置だけを調べるため、周期 L ごとの
//! 「バッチ」を単位として作業を分配する。
//!
//! パイプライン:
//! - ディスパッチャがバッチ番号 0..total を容量 W の有界チャネルへ流す
//!   （満杯ならブロックするので、探索範囲によらずメモリ使用量は一定）
//! - W 個のワーカーがバッチを受け取り、各自の 2^n mod 10^d を前進させて判定する
//! - 送信が終わるとチャネルを閉じ、ワーカーは手持ちのバッチを終えて結果を返す
//! - 呼び出し側スレッドが結果を集約し、解を昇順、記録を偶数桁数の降順に並べる
//!
//! 設定（法・歩幅・バンプ・べき乗表）はプール起動前に構築し、以後は
//! 不変の参照として共有する。

use std::cmp::Reverse;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::accelerator::LoopAccelerator;
use crate::error::{ArithError, SieveError};
use crate::modpow::PowerTable;
use crate::wide::{Wide, MAX_DECIMAL_DIGITS, TEN};

/// 探索パラメータ（CLI 層でデコード済みの値）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    /// 保持する下位桁数 d（法 10^d）
    pub digits: u32,
    /// ワーカー数 W
    pub workers: usize,
    /// 探索する指数の上限
    pub limit: u64,
    pub verbose: bool,
}

impl SearchParams {
    pub fn new(digits: u32, workers: usize, limit: u64) -> Self {
        SearchParams { digits, workers, limit, verbose: false }
    }

    fn validate(&self) -> Result<(), SieveError> {
        if self.digits == 0 || self.digits > MAX_DECIMAL_DIGITS {
            return Err(SieveError::InvalidParams(format!(
                "digits must be in 1..={}, got {}",
                MAX_DECIMAL_DIGITS, self.digits
            )));
        }
        if self.workers == 0 {
            return Err(SieveError::InvalidParams("at least one worker is required".into()));
        }
        Ok(())
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism().map_or(1, |n| n.get());
        SearchParams {
            digits: 50,
            workers: (cpus / 2).max(1),
            limit: 10_000_000_000,
            verbose: false,
        }
    }
}

/// ワーカー間で共有する不変の設定
#[derive(Debug, Clone)]
pub struct Configuration {
    modulus: Wide,
    steps: Vec<u64>,
    bumps: Vec<Wide>,
    table: PowerTable,
    cycle_length: u64,
}

impl Configuration {
    /// 法 10^digits と、各歩幅に対応するバンプ 2^step mod 10^digits を求める
    pub fn new(digits: u32, accel: &LoopAccelerator) -> Result<Self, SieveError> {
        accel.validate()?;
        let modulus = Wide::power_of_ten(digits)?;
        let table = PowerTable::new(&Wide::from_u64(2), &modulus)?;
        let steps = accel.steps();
        let bumps = steps
            .par_iter()
            .map(|&step| table.pow_u64(step))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Configuration {
            modulus,
            steps,
            bumps,
            table,
            cycle_length: accel.length,
        })
    }

    pub fn modulus(&self) -> &Wide {
        &self.modulus
    }

    pub fn steps(&self) -> &[u64] {
        &self.steps
    }

    pub fn bumps(&self) -> &[Wide] {
        &self.bumps
    }

    pub fn cycle_length(&self) -> u64 {
        self.cycle_length
    }
}

/// 偶数桁数の最高記録: 指数 `exponent` で下位 `digits` 桁が偶数だった
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Z")]
    pub exponent: u64,
    #[serde(rename = "Digits")]
    pub digits: u32,
}

/// ワーカー1つ分の結果
#[derive(Debug, Clone)]
pub struct WorkerResult {
    pub id: usize,
    pub success: bool,
    /// 見つかった解（このワーカー内では指数の昇順）
    pub solutions: Vec<u64>,
    /// 最高記録の更新履歴
    pub records: Vec<Record>,
    pub max_even: u32,
    /// 判定した候補数
    pub tests: u64,
    /// success が false のときの原因
    pub failure: Option<ArithError>,
}

/// 探索全体の集約結果
#[derive(Debug, Clone)]
pub struct SearchReport {
    /// 全偶数桁となった指数（昇順、導入部を含む）
    pub solutions: Vec<u64>,
    /// 最高記録（偶数桁数の降順）
    pub records: Vec<Record>,
    pub max_even: u32,
    pub tests: u64,
    pub limit: u64,
    pub batches: u64,
    pub elapsed: Duration,
}

impl SearchReport {
    /// 総当たりに対する削減率
    pub fn gain(&self) -> f64 {
        if self.tests == 0 {
            return 0.0;
        }
        self.limit as f64 / self.tests as f64
    }

    /// 1秒あたりに処理した指数の数
    pub fn rate(&self) -> f64 {
        self.limit as f64 / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }

    /// 記録一覧の JSON（2 スペース字下げ）
    pub fn records_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.records)
    }

    pub fn write_records(&self, path: impl AsRef<Path>) -> Result<(), SieveError> {
        fs::write(path, self.records_json()?)?;
        Ok(())
    }
}

/// 最下位から数えて最初の奇数桁の位置を返す。全桁偶数なら None。
///
/// 0 は桁を持たないので全偶数扱い。
#[inline]
pub fn first_odd_digit(mut z: Wide) -> Option<u32> {
    let mut position = 0;
    while !z.is_zero() {
        if z.div_mod_small(TEN) % 2 == 1 {
            return Some(position);
        }
        position += 1;
    }
    None
}

/// 導入部 1..=leadin の指数を直接調べる（2 から始めて倍々）
pub fn lead_in_solutions(config: &Configuration, leadin: u64) -> Result<Vec<u64>, ArithError> {
    let two = Wide::from_u64(2);
    let mut z = two;
    z.reduce(&config.modulus)?;
    let mut solutions = Vec::new();
    for n in 1..=leadin {
        if first_odd_digit(z).is_none() {
            solutions.push(n);
        }
        z.mul_mod(&two, &config.modulus)?;
    }
    Ok(solutions)
}

/// 1ワーカーの私的な状態。値 2^exponent mod 10^d を保持し、指数の昇順に進む
struct Worker<'a> {
    config: &'a Configuration,
    exponent: u64,
    value: Wide,
    result: WorkerResult,
}

impl<'a> Worker<'a> {
    fn new(id: usize, config: &'a Configuration) -> Self {
        Worker {
            config,
            exponent: 0,
            value: Wide::ONE,
            result: WorkerResult {
                id,
                success: false,
                solutions: Vec::new(),
                records: Vec::new(),
                max_even: 0,
                tests: 0,
                failure: None,
            },
        }
    }

    /// バッチ j（指数 j·L から1周期分）を処理する
    fn run_batch(&mut self, batch: u64) -> Result<(), ArithError> {
        let config = self.config;
        let start = batch * config.cycle_length;

        // バッチ先頭へ同期。後戻りする場合は先頭から計算し直す
        if start > self.exponent {
            let bump = config.table.pow_u64(start - self.exponent)?;
            self.value.mul_mod(&bump, &config.modulus)?;
        } else if start < self.exponent {
            self.value = config.table.pow_u64(start)?;
        }
        self.exponent = start;

        let cycle_size = config.steps.len() - 1;
        for (&step, bump) in config.steps[..cycle_size].iter().zip(&config.bumps) {
            self.exponent += step;
            self.value.mul_mod(bump, &config.modulus)?;
            self.result.tests += 1;
            match first_odd_digit(self.value) {
                None => self.result.solutions.push(self.exponent),
                Some(even) if even > self.result.max_even => {
                    self.result.max_even = even;
                    self.result.records.push(Record {
                        exponent: self.exponent,
                        digits: even,
                    });
                }
                Some(_) => {}
            }
        }
        self.exponent += config.steps[cycle_size];
        self.value.mul_mod(&config.bumps[cycle_size], &config.modulus)?;
        Ok(())
    }

    fn finish(mut self, failure: Option<ArithError>) -> WorkerResult {
        self.result.success = failure.is_none();
        self.result.failure = failure;
        self.result
    }
}

/// チャネルが閉じるまでバッチを処理する
fn run_worker(id: usize, config: &Configuration, jobs: Receiver<u64>, stop: &AtomicBool) -> WorkerResult {
    let mut worker = Worker::new(id, config);
    for batch in jobs.iter() {
        if let Err(e) = worker.run_batch(batch) {
            warn!(worker = id, batch, error = %e, "worker failed");
            stop.store(true, Ordering::Relaxed);
            return worker.finish(Some(e));
        }
    }
    debug!(worker = id, "exiting");
    worker.finish(None)
}

/// 進捗: 送信済みバッチ数、割合、1バッチあたりの時間、残り時間の見積もり
fn report_progress(sent: u64, total: u64, started: Instant) {
    let elapsed = started.elapsed().as_secs_f64();
    let per_batch = (elapsed + 0.5) / (sent + 1) as f64;
    info!(
        "sender: {:6} ({:5.1}%, {:.1} {:.1}) {:.1} seconds remaining",
        sent,
        sent as f64 * 100.0 / total as f64,
        per_batch * 1000.0,
        elapsed * 1000.0,
        (total - sent) as f64 * per_batch,
    );
}

/// バッチ番号を順に送り、終わったら（または停止要求で）チャネルを閉じる。
/// 全バッチを送り切ったら true、途中で打ち切ったら false を返す。
///
/// 5% ごとに進捗を出す。それまでは1秒ごとのティッカーで、
/// 経過時間に応じた間隔 min(30, max(5, 経過/2.5)) 秒ごとに出す。
fn dispatch(
    total_batches: u64,
    jobs: Sender<u64>,
    cancel: &AtomicBool,
    stop: &AtomicBool,
    verbose: bool,
    progress_callback: &(impl Fn(u64, u64) + Sync),
) -> bool {
    let step = total_batches.div_ceil(20).max(1);
    let ticker = tick(Duration::from_secs(1));
    let started = Instant::now();
    let mut last_report = started;
    let mut normal_reporting = false;

    let mut i = 0u64;
    while i < total_batches {
        if cancel.load(Ordering::Relaxed) || stop.load(Ordering::Relaxed) {
            debug!(sent = i, "sender: stopping early");
            break;
        }
        select! {
            recv(ticker) -> _ => {
                let interval = (started.elapsed().as_secs_f64() / 2.5).clamp(5.0, 30.0);
                if verbose && !normal_reporting && last_report.elapsed().as_secs_f64() >= interval {
                    report_progress(i, total_batches, started);
                    last_report = Instant::now();
                }
            }
            send(jobs, i) -> sent => {
                if sent.is_err() {
                    warn!(sent = i, "sender: no workers left");
                    break;
                }
                i += 1;
                progress_callback(i, total_batches);
                if verbose && i % step == 0 {
                    if normal_reporting || last_report.elapsed() > Duration::from_secs(5) {
                        report_progress(i, total_batches, started);
                    }
                    normal_reporting = true;
                }
            }
        }
    }
    debug!(sent = i, "sender: completed");
    // jobs をドロップしてチャネルを閉じる
    i == total_batches
}

/// 全ワーカーの結果を受け取る。失敗報告か途中で閉じたチャネルは致命的
fn collect_results(
    results: &Receiver<WorkerResult>,
    expected: usize,
    stop: &AtomicBool,
) -> Result<Vec<WorkerResult>, SieveError> {
    let mut collected = Vec::with_capacity(expected);
    for received in 0..expected {
        let Ok(r) = results.recv() else {
            stop.store(true, Ordering::Relaxed);
            return Err(SieveError::ResultsClosed { received, expected });
        };
        info!(worker = r.id, max_even = r.max_even, tests = r.tests, "worker result");
        if !r.success {
            stop.store(true, Ordering::Relaxed);
            return Err(SieveError::WorkerFailed {
                id: r.id,
                source: r.failure.unwrap_or(ArithError::InvariantViolation {
                    context: "worker reported failure without a cause",
                }),
            });
        }
        collected.push(r);
    }
    Ok(collected)
}

/// 解と記録を連結し、解は昇順、記録は偶数桁数の降順に並べる
fn aggregate(
    mut solutions: Vec<u64>,
    results: Vec<WorkerResult>,
    limit: u64,
    batches: u64,
    elapsed: Duration,
) -> SearchReport {
    let mut records = Vec::new();
    let mut tests = 0u64;
    let mut max_even = 0u32;
    for r in results {
        solutions.extend(r.solutions);
        records.extend(r.records);
        tests += r.tests;
        max_even = max_even.max(r.max_even);
    }
    solutions.sort_unstable();
    records.sort_by_key(|r| (Reverse(r.digits), r.exponent));
    SearchReport {
        solutions,
        records,
        max_even,
        tests,
        limit,
        batches,
        elapsed,
    }
}

/// バッチ数 ceil(limit / L)。最後のバッチの終端が u64 に収まることも確認する
fn batch_count(limit: u64, cycle_length: u64) -> Result<u64, SieveError> {
    let batches = limit.div_ceil(cycle_length);
    batches
        .checked_add(1)
        .and_then(|b| b.checked_mul(cycle_length))
        .ok_or_else(|| SieveError::InvalidParams(format!("limit {} overflows the exponent range", limit)))?;
    Ok(batches)
}

/// ワーカー W 個とディスパッチャ 1 個を専用プールで走らせ、全ワーカーの結果と
/// ディスパッチャが全バッチを送り切ったかどうかを返す
fn run_pipeline(
    config: &Configuration,
    workers: usize,
    total_batches: u64,
    cancel: &AtomicBool,
    verbose: bool,
    progress_callback: &(impl Fn(u64, u64) + Sync),
) -> Result<(Vec<WorkerResult>, bool), SieveError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers + 1)
        .thread_name(|i| format!("sieve-{}", i))
        .build()?;

    let (job_tx, job_rx) = bounded::<u64>(workers);
    let (result_tx, result_rx) = bounded::<WorkerResult>(workers);
    let stop = AtomicBool::new(false);
    let mut dispatched_all = false;

    let collected = pool.in_place_scope(|s| {
        let stop = &stop;
        let dispatched_all = &mut dispatched_all;

        s.spawn(move |_| {
            *dispatched_all = dispatch(total_batches, job_tx, cancel, stop, verbose, progress_callback);
        });
        for id in 0..workers {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            s.spawn(move |_| {
                let r = run_worker(id, config, jobs, stop);
                if results.send(r).is_err() {
                    warn!(worker = id, "result dropped: collector is gone");
                }
            });
        }
        // 手元の端点を閉じておかないと、チャネルの切断を検出できない
        drop(job_rx);
        drop(result_tx);

        collect_results(&result_rx, workers, stop)
    })?;

    Ok((collected, dispatched_all))
}

/// 並列探索
pub fn search(params: &SearchParams, accel: &LoopAccelerator) -> Result<SearchReport, SieveError> {
    let cancel = AtomicBool::new(false);
    search_cancellable(params, accel, &cancel, |_, _| {})
}

/// キャンセル可能な並列探索。
/// cancel が true になるとディスパッチを打ち切り、`SieveError::Cancelled` を返す。
/// 全バッチの送信後に立った cancel は無視して結果を返す。
/// progress_callback: (送信済みバッチ数, 総バッチ数) を送信ごとに呼ぶ。
pub fn search_cancellable(
    params: &SearchParams,
    accel: &LoopAccelerator,
    cancel: &AtomicBool,
    progress_callback: impl Fn(u64, u64) + Sync,
) -> Result<SearchReport, SieveError> {
    params.validate()?;
    let config = Configuration::new(params.digits, accel)?;
    let started = Instant::now();

    let solutions = lead_in_solutions(&config, accel.leadin)?;
    let total_batches = batch_count(params.limit, config.cycle_length)?;

    info!(
        workers = params.workers,
        digits = params.digits,
        limit = params.limit,
        batches = total_batches,
        "starting sieve"
    );
    let (collected, dispatched_all) = run_pipeline(
        &config,
        params.workers,
        total_batches,
        cancel,
        params.verbose,
        &progress_callback,
    )?;

    // 全バッチを送り終えた後のキャンセルは結果を捨てない
    if !dispatched_all && cancel.load(Ordering::Relaxed) {
        return Err(SieveError::Cancelled);
    }

    Ok(aggregate(solutions, collected, params.limit, total_batches, started.elapsed()))
}

/// 1スレッドで全バッチを順に処理する。並列版と同じ解を返す
pub fn search_sequential(params: &SearchParams, accel: &LoopAccelerator) -> Result<SearchReport, SieveError> {
    params.validate()?;
    let config = Configuration::new(params.digits, accel)?;
    let started = Instant::now();

    let solutions = lead_in_solutions(&config, accel.leadin)?;
    let total_batches = batch_count(params.limit, config.cycle_length)?;

    let mut worker = Worker::new(0, &config);
    for batch in 0..total_batches {
        worker
            .run_batch(batch)
            .map_err(|source| SieveError::WorkerFailed { id: 0, source })?;
    }
    let result = worker.finish(None);

    Ok(aggregate(solutions, vec![result], params.limit, total_batches, started.elapsed()))
}
