use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;
use std::time::Instant;

use clap::Parser;
use even_digits::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn default_workers() -> usize {
    SearchParams::default().workers
}

/// 下位 d 桁がすべて偶数になる 2^n を探す
#[derive(Parser, Debug)]
#[command(name = "even-digits", version, about)]
struct Args {
    /// 調べる下位桁数（1..=77）
    #[arg(short, long, default_value_t = 50)]
    digits: u32,

    /// ワーカースレッド数
    #[arg(short = 'j', long, default_value_t = default_workers())]
    threads: usize,

    /// ループアクセラレータ（周期検出ツールの JSON）
    #[arg(short, long, value_name = "FILE", default_value = "cycle-012.json")]
    sieve: PathBuf,

    /// 探索上限（例: 10G, 1_500M, 2T）
    #[arg(short, long, default_value = "10G", value_parser = decode_limit)]
    limit: u64,

    /// 最高記録の出力先
    #[arg(short, long, value_name = "FILE", default_value = "records.json")]
    records: PathBuf,

    /// 任意精度の参照実装で解を照合する（遅い）
    #[arg(long)]
    check: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "even_digits=debug" } else { "even_digits=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .init();
}

fn format_eta(eta_s: f64) -> String {
    if eta_s > 3600.0 {
        format!("{:.1}h", eta_s / 3600.0)
    } else if eta_s > 60.0 {
        format!("{:.0}m{:.0}s", (eta_s / 60.0).floor(), eta_s % 60.0)
    } else {
        format!("{:.0}s", eta_s)
    }
}

fn run(args: &Args) -> Result<(), SieveError> {
    let accel = LoopAccelerator::load(&args.sieve)?;
    info!(
        path = %args.sieve.display(),
        order = accel.order,
        length = accel.length,
        items = accel.index.len(),
        "loaded loop accelerator"
    );
    info!("Limit: {}", format_limit(args.limit));

    let params = SearchParams {
        digits: args.digits,
        workers: args.threads,
        limit: args.limit,
        verbose: args.verbose,
    };

    println!("全偶数桁探索: 2^n mod 10^{}, n ≤ {}", params.digits, params.limit);
    println!(
        "(周期 {} / 候補 {} 個、{}ワーカー並列)",
        accel.length,
        accel.index.len(),
        params.workers
    );
    println!();

    let timer = Instant::now();
    let last_print = Mutex::new(Instant::now());
    let cancel = AtomicBool::new(false);
    let show_progress = !args.verbose;
    let report = search_cancellable(&params, &accel, &cancel, |done, total| {
        if !show_progress || total == 0 {
            return;
        }
        let now = Instant::now();
        if let Ok(mut lp) = last_print.try_lock() {
            if now.duration_since(*lp).as_millis() >= 500 {
                let elapsed = timer.elapsed().as_secs_f64();
                let pct = done as f64 / total as f64 * 100.0;
                let bps = done as f64 / elapsed.max(f64::EPSILON);
                let remaining = if done > 0 {
                    format_eta((total - done) as f64 / bps)
                } else {
                    "---".to_string()
                };
                eprint!(
                    "\x1b[2K\r  [{:.1}s] {}/{} ({:.1}%) | {:.0} batches/s | 残り約{}",
                    elapsed, done, total, pct, bps, remaining
                );
                *lp = now;
            }
        }
    })?;
    if show_progress {
        eprintln!();
    }

    println!("--- 結果 ---");
    println!("探索上限            = {} ({})", report.limit, format_limit(report.limit));
    println!("バッチ数            = {}", report.batches);
    println!("判定した候補数      = {}", report.tests);
    println!("削減率              = {:.2}", report.gain());
    println!("最大偶数桁数        = {}", report.max_even);
    println!("計算時間            = {:?}", report.elapsed);
    println!("処理速度            = {:.0} n/s", report.rate());
    println!("解 ({} 個):", report.solutions.len());
    for n in &report.solutions {
        println!("  2^{}", n);
    }

    report.write_records(&args.records)?;
    println!("\n記録保存: {} ({} 件)", args.records.display(), report.records.len());

    if args.check {
        println!();
        println!("参照実装で照合中...");
        let expected = reference_solutions(params.digits, &accel, params.limit);
        if expected != report.solutions {
            error!(?expected, found = ?report.solutions, "solutions differ from the reference");
            return Err(SieveError::ReferenceMismatch {
                found: report.solutions.len(),
                expected: expected.len(),
            });
        }
        println!("照合 OK: {} 個の解が一致", expected.len());
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "search failed");
            eprintln!("エラー: {}", e);
            ExitCode::FAILURE
        }
    }
}
