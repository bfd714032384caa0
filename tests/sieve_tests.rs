use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use even_digits::*;

/// 周期検出ツールが 10^2 について出力するファイル
const CYCLE_002: &str = r#"{
  "Mask": 100,
  "Order": 2,
  "Length": 20,
  "Leadin": 2,
  "EvenItems": 5,
  "Gain": 4,
  "Cycle": [
    8,
    24,
    48,
    64,
    88
  ],
  "Index": [
    3,
    6,
    10,
    11,
    19
  ]
}"#;

fn cycle_002() -> LoopAccelerator {
    LoopAccelerator::from_json_str(CYCLE_002).unwrap()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("even-digits-{}-{}", std::process::id(), name))
}

#[test]
fn test_load_accelerator_file() {
    let path = temp_path("cycle-002.json");
    fs::write(&path, CYCLE_002).unwrap();
    let accel = LoopAccelerator::load(&path).unwrap();
    fs::remove_file(&path).ok();
    assert_eq!(accel, cycle_002());
    assert_eq!(accel.steps(), vec![3, 3, 4, 1, 8, 1]);
}

#[test]
fn test_missing_accelerator_file() {
    let err = LoopAccelerator::load(temp_path("does-not-exist.json")).unwrap_err();
    assert!(matches!(err, AcceleratorError::Io(_)));
}

#[test]
fn test_eight_digits_known_solutions() {
    let params = SearchParams::new(8, 4, 2000);
    let report = search(&params, &cycle_002()).unwrap();
    assert_eq!(
        report.solutions,
        vec![1, 2, 3, 6, 11, 50, 71, 190, 291, 491, 523, 590, 650, 719, 771, 811, 990, 1011, 1223, 1723, 1899]
    );
    assert_eq!(report.batches, 100);
    assert_eq!(report.tests, 500);
    assert_eq!(report.gain(), 4.0);
}

#[test]
fn test_parallel_matches_sequential_and_reference() {
    let accel = cycle_002();
    for digits in [3u32, 4, 8, 50] {
        let params = SearchParams::new(digits, 3, 2000);
        let parallel = search(&params, &accel).unwrap();
        let sequential = search_sequential(&params, &accel).unwrap();
        assert_eq!(parallel.solutions, sequential.solutions, "d={}", digits);
        assert_eq!(parallel.tests, sequential.tests);
        assert_eq!(parallel.max_even, sequential.max_even);
        assert_eq!(parallel.solutions, reference_solutions(digits, &accel, 2000), "d={}", digits);
        assert_eq!(parallel.solutions, brute_force_solutions(digits, 2000), "d={}", digits);
    }
}

#[test]
fn test_worker_count_does_not_change_result() {
    let accel = cycle_002();
    let expected = search_sequential(&SearchParams::new(30, 1, 4000), &accel).unwrap();
    for workers in [1, 2, 5, 8] {
        let report = search(&SearchParams::new(30, workers, 4000), &accel).unwrap();
        assert_eq!(report.solutions, expected.solutions, "workers={}", workers);
        assert_eq!(report.tests, expected.tests);
        assert_eq!(report.max_even, expected.max_even);
        // 記録の最上位は全ワーカーの最大値
        assert_eq!(report.records.first().map(|r| r.digits), Some(report.max_even));
    }
}

#[test]
fn test_records_sorted_descending() {
    let report = search(&SearchParams::new(50, 4, 4000), &cycle_002()).unwrap();
    assert!(!report.records.is_empty());
    for pair in report.records.windows(2) {
        assert!(pair[0].digits >= pair[1].digits);
    }
    assert_eq!(report.records[0].digits, report.max_even);
}

#[test]
fn test_write_records_file() {
    let report = search_sequential(&SearchParams::new(50, 1, 1000), &cycle_002()).unwrap();
    let path = temp_path("records.json");
    report.write_records(&path).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    fs::remove_file(&path).ok();

    assert!(text.starts_with("[\n  {\n    \"Z\": 590,\n    \"Digits\": 13\n  }"));
    let records: Vec<Record> = serde_json::from_str(&text).unwrap();
    assert_eq!(records, report.records);
    assert_eq!(records.len(), 7);
}

#[test]
fn test_lead_in_only() {
    // 上限 0 でも導入部は調べる
    let report = search(&SearchParams::new(50, 2, 0), &cycle_002()).unwrap();
    assert_eq!(report.solutions, vec![1, 2]);
    assert_eq!(report.tests, 0);
    assert_eq!(report.batches, 0);
    assert!(report.records.is_empty());
}

#[test]
fn test_progress_reports_every_batch() {
    let cancel = AtomicBool::new(false);
    let last = AtomicU64::new(0);
    let calls = AtomicU64::new(0);
    let params = SearchParams::new(20, 3, 1000);
    let report = search_cancellable(&params, &cycle_002(), &cancel, |done, total| {
        assert_eq!(total, 50);
        last.fetch_max(done, Ordering::Relaxed);
        calls.fetch_add(1, Ordering::Relaxed);
    })
    .unwrap();
    assert_eq!(report.batches, 50);
    assert_eq!(calls.load(Ordering::Relaxed), 50);
    assert_eq!(last.load(Ordering::Relaxed), 50);
}

#[test]
fn test_cancel_mid_search() {
    let cancel = AtomicBool::new(false);
    let params = SearchParams::new(50, 2, 1_000_000);
    let result = search_cancellable(&params, &cycle_002(), &cancel, |done, _| {
        if done >= 100 {
            cancel.store(true, Ordering::Relaxed);
        }
    });
    assert!(matches!(result, Err(SieveError::Cancelled)));
}

#[test]
fn test_invalid_accelerator_rejected_by_search() {
    let accel = LoopAccelerator {
        index: vec![3, 25],
        ..cycle_002()
    };
    let result = search(&SearchParams::new(10, 2, 100), &accel);
    assert!(matches!(
        result,
        Err(SieveError::Accelerator(AcceleratorError::OutOfCycle { index: 25, .. }))
    ));
}

#[test]
fn test_limit_string_drives_search() {
    let limit = decode_limit("2_000").unwrap();
    let report = search(&SearchParams::new(8, 2, limit), &cycle_002()).unwrap();
    assert_eq!(report.limit, 2000);
    assert_eq!(report.solutions.last(), Some(&1899));
    assert_eq!(format_limit(decode_limit("10G").unwrap()), "10.0G");
}
