//! 캐시 빌더와 재생 오라클 통합 테스트.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use cycle_core::{Candle, OracleEstimate, OracleQuery, MS_PER_MINUTE};
use cycle_data::{CandleStore, MetricsWindow};
use cycle_oracle::{
    cache_file_name, CacheBuilder, CacheDocument, CachePeriod, FixedOracle, ProbabilityOracle,
    ProbabilitySource, ReplayOracle,
};

/// 홀수 분은 실패, 짝수 분은 분 번호에 비례한 확률을 돌려주는 소스.
/// 응답 지연을 뒤섞어 순서 보존을 확인합니다.
struct ScriptedSource {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    seen: Mutex<Vec<i64>>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ProbabilitySource for ScriptedSource {
    async fn fetch(&self, query: &OracleQuery) -> OracleEstimate {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let minute = query.timestamp / MS_PER_MINUTE;
        tokio::time::sleep(Duration::from_millis((7 - minute % 7) as u64)).await;
        self.seen.lock().unwrap().push(query.timestamp);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if minute % 2 == 1 {
            OracleEstimate::failed("timeout")
        } else {
            OracleEstimate::from_probability((minute as f64 / 100.0).min(1.0))
        }
    }
}

fn store(minutes: i64) -> CandleStore {
    let coarse = (0..minutes)
        .map(|m| Candle::new(m * MS_PER_MINUTE, 100.0, 100.0 + (m % 3) as f64 * 0.1, 99.9))
        .collect();
    let fine = (0..minutes * 60)
        .map(|s| Candle::flat(s * 1_000, 100.0 + (s % 60) as f64 * 0.001))
        .collect();
    CandleStore::new(fine, coarse)
}

fn window() -> MetricsWindow {
    MetricsWindow {
        steps: 2,
        delta_multiplier: 1,
        ltma_multiplier: 2,
    }
}

fn period() -> CachePeriod {
    CachePeriod {
        from: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
        to: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
    }
}

#[test]
fn test_queries_skip_warmup_and_insufficient_history() {
    let store = store(20);
    let builder = CacheBuilder::new(0.01, window());

    let queries = builder.queries(&store);
    // 지표는 4분부터, 마지막 분(19)은 제외
    assert_eq!(queries.len(), 15);
    assert_eq!(queries[0].timestamp, 4 * MS_PER_MINUTE);
    assert_eq!(queries.last().unwrap().timestamp, 18 * MS_PER_MINUTE);
    let q = queries[0];
    assert!((q.lower - q.price * 0.99).abs() < 1e-12);
    assert!((q.upper - q.price * 1.01).abs() < 1e-12);

    let warm = builder.clone().with_warmup_minutes(10).queries(&store);
    assert_eq!(warm.len(), 9);
    assert_eq!(warm[0].timestamp, 10 * MS_PER_MINUTE);
}

#[tokio::test]
async fn test_build_preserves_order_and_bounds_concurrency() {
    let store = store(40);
    let source = ScriptedSource::new();
    let progress_calls = AtomicUsize::new(0);
    let progress = |done: usize, total: usize| {
        assert!(done <= total);
        progress_calls.fetch_add(1, Ordering::SeqCst);
    };

    let builder = CacheBuilder::new(0.005, window()).with_concurrency(4);
    let (doc, summary) = builder.build(&store, &source, period(), Some(&progress)).await;

    assert_eq!(doc.data.len(), 35);
    assert_eq!(progress_calls.load(Ordering::SeqCst), 35);
    assert!(source.max_in_flight.load(Ordering::SeqCst) <= 4);

    let stamps: Vec<i64> = doc.data.iter().map(|r| r.timestamp).collect();
    let mut sorted = stamps.clone();
    sorted.sort();
    assert_eq!(stamps, sorted);

    for record in &doc.data {
        let minute = record.timestamp / MS_PER_MINUTE;
        if minute % 2 == 1 {
            assert_eq!(record.probability, 0.0);
            assert_eq!(record.error.as_deref(), Some("timeout"));
        } else {
            assert!(record.error.is_none());
        }
    }
    assert_eq!(summary.records, 35);
    assert_eq!(summary.errors, doc.data.iter().filter(|r| r.error.is_some()).count());
    assert_eq!(doc.steps, 2);
}

#[tokio::test]
async fn test_saved_cache_replays() {
    let store = store(30);
    let builder = CacheBuilder::new(0.005, window());
    let (doc, _) = builder
        .build(&store, &FixedOracle::new(0.8), period(), None)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir
        .path()
        .join("rm-cache")
        .join(cache_file_name(0.005, period().from, period().to));
    doc.save(&path).unwrap();

    assert!(path.ends_with("rm-cache/cache_0_5pct_2025-05-01_2025-05-01.json"));
    assert_eq!(CacheDocument::load(&path).unwrap().data, doc.data);

    let replay = ReplayOracle::load(&path).unwrap();
    assert_eq!(replay.len(), doc.data.len());
    assert_eq!(replay.anomalies(), 0);
    assert_eq!(replay.period(), Some(period()));

    let first = &doc.data[0];
    let query = OracleQuery {
        timestamp: first.timestamp,
        price: first.price,
        delta: first.delta,
        ltma: first.ltma,
        steps: 2,
        range: 0.005,
        lower: first.lower,
        upper: first.upper,
    };
    assert_eq!(replay.estimate(&query).unwrap().probability, 0.8);
}
