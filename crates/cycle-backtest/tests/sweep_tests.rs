//! 스윕 실행기 통합 테스트.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{noisy_probability, random_walk_store, replay, window};
use cycle_backtest::{CycleEngine, OracleRegistry, PnlModel, SweepMatrix, SweepRunner};
use cycle_core::SimulationSettings;
use cycle_data::FeatureGrid;
use cycle_oracle::{FixedOracle, ProbabilityOracle};

fn matrix() -> SweepMatrix {
    SweepMatrix {
        entry_pairs: vec![(0.3, 0.7), (0.2, 0.8)],
        min_probability: vec![0.7, 0.85],
        lock_before_end: vec![60, 600],
        tp_percent: vec![0.2, 0.35],
        ranges: vec![0.005, 0.01],
        cycle_times: vec![10],
        close_strategies: vec!["cycle_timeout".into(), "no_sl".into()],
    }
}

#[test]
fn test_every_combination_is_reported() {
    let store = random_walk_store(360, 17);
    let grid = FeatureGrid::build(&store, window());
    // 0.01 레인지 캐시는 없음 → 해당 조합은 실패로 기록
    let oracles = OracleRegistry::from_replays([replay(&store, 0.005, noisy_probability(2))]);

    let combos = matrix().expand(&SimulationSettings::default()).unwrap();
    assert_eq!(combos.len(), 64);

    let calls = AtomicUsize::new(0);
    let progress = |done: usize, total: usize| {
        assert!(done <= total);
        calls.fetch_add(1, Ordering::SeqCst);
    };

    let report = SweepRunner::new(&store, &grid, &oracles, PnlModel::new(0.5, 3.0, 0.00045))
        .run(&combos, Some(&progress));

    assert_eq!(report.total, 64);
    assert_eq!(report.entries.len(), 64);
    assert_eq!(calls.load(Ordering::SeqCst), 64);

    // 레인지 0.01 절반 + 잠금 600초(= 사이클 길이) 절반
    assert_eq!(report.failed, 48);
    for failure in report.failures() {
        assert!(failure.params.range == 0.01 || failure.params.lock_before_end_secs == 600);
        assert!(failure.error.is_some());
        assert_eq!(failure.summary.total_trades, 0);
    }

    let ranked = report.ranked();
    assert_eq!(ranked.len(), 16);
    assert!(ranked
        .windows(2)
        .all(|w| w[0].summary.total_pnl >= w[1].summary.total_pnl));
    for combo in &combos {
        assert!(report.entries.iter().any(|e| e.params == *combo));
    }
}

#[test]
fn test_parallel_results_match_sequential_runs() {
    let store = random_walk_store(360, 29);
    let grid = FeatureGrid::build(&store, window());
    let oracle: Arc<dyn ProbabilityOracle> = Arc::new(replay(&store, 0.005, noisy_probability(4)));
    let oracles = OracleRegistry::single(oracle.clone());
    let pnl = PnlModel::new(0.5, 3.0, 0.00045);

    let m = SweepMatrix {
        ranges: vec![0.005],
        lock_before_end: vec![60, 120],
        ..matrix()
    };
    let combos = m.expand(&SimulationSettings::default()).unwrap();
    let report = SweepRunner::new(&store, &grid, &oracles, pnl.clone()).run(&combos, None);
    assert_eq!(report.failed, 0);

    let engine = CycleEngine::new(&store, &grid, oracle.as_ref(), pnl);
    for entry in &report.entries {
        let direct = engine.run(&entry.params).unwrap();
        assert_eq!(direct.summary, entry.summary);
    }
}

#[test]
fn test_zero_trade_combinations_still_counted() {
    let store = random_walk_store(120, 1);
    let grid = FeatureGrid::build(&store, window());
    // 확률이 항상 부족 → 거래 없음
    let oracles = OracleRegistry::single(Arc::new(FixedOracle::new(0.1)));

    let m = SweepMatrix {
        ranges: vec![],
        lock_before_end: vec![60],
        ..matrix()
    };
    let combos = m.expand(&SimulationSettings::default()).unwrap();
    let report = SweepRunner::new(&store, &grid, &oracles, PnlModel::new(0.5, 3.0, 0.0))
        .run(&combos, None);

    assert_eq!(report.entries.len(), combos.len());
    assert_eq!(report.failed, 0);
    assert!(report.entries.iter().all(|e| e.summary.total_trades == 0));
    assert!(report
        .entries
        .iter()
        .all(|e| e.summary.counters.oracle_rejected > 0));

    let tables = report.sensitivity();
    let pairs = tables.iter().find(|t| t.dimension == "entry_pair").unwrap();
    assert_eq!(pairs.rows.len(), 2);
    assert_eq!(pairs.rows.iter().map(|r| r.runs).sum::<usize>(), combos.len());
}

#[test]
fn test_matrix_file_formats() {
    let dir = tempfile::tempdir().unwrap();

    let toml_path = dir.path().join("matrix.toml");
    std::fs::write(
        &toml_path,
        r#"
entry_pairs = [[0.3, 0.7], [0.25, 0.75]]
min_probability = [0.8]
lock_before_end = [60, 120]
tp_percent = [0.35]
close_strategies = ["no_cycle"]
"#,
    )
    .unwrap();
    let from_toml = SweepMatrix::load(&toml_path).unwrap();
    assert_eq!(from_toml.combination_count(), 4);

    let json_path = dir.path().join("matrix.json");
    std::fs::write(
        &json_path,
        r#"{"entryPairs": [[0.3, 0.7]], "minProbability": [0.8, 0.9],
            "lockBeforeEnd": [60], "tpPercent": [0.35], "ranges": [0.005, 0.0075]}"#,
    )
    .unwrap();
    let from_json = SweepMatrix::load(&json_path).unwrap();
    assert_eq!(from_json.combination_count(), 4);

    let broken = dir.path().join("broken.toml");
    std::fs::write(&broken, "entry_pairs = ").unwrap();
    assert!(SweepMatrix::load(&broken).is_err());
}
