//! 확률 캐시 문서와 캐시 빌더.
//!
//! 한 레인지에 대해 모든 분 틱의 오라클 확률을 미리 계산해 두면, 진입
//! 임계값/최소 확률/진입 금지 구간 조합은 API 호출 없이 재생할 수 있습니다.
//!
//! 문서 형식:
//! ```json
//! {"range": 0.005, "steps": 10, "period": {"from": "2025-05-01", "to": "2025-06-01"},
//!  "createdAt": "2025-06-02T10:00:00Z", "data": [{"timestamp": ..., "probability": ...}]}
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::BufWriter;
use std::path::Path;
use tracing::{info, warn};

use cycle_core::{OracleQuery, ProbabilityRecord, MS_PER_MINUTE};
use cycle_data::{CandleStore, MetricsWindow};

use crate::error::{OracleError, OracleResult};
use crate::oracle::ProbabilitySource;

/// 캐시 대상 기간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePeriod {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// 확률 캐시 문서.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheDocument {
    pub range: f64,
    pub steps: u32,
    pub period: CachePeriod,
    pub created_at: DateTime<Utc>,
    pub data: Vec<ProbabilityRecord>,
}

impl CacheDocument {
    /// 파일로 저장합니다. 상위 디렉터리가 없으면 만듭니다.
    pub fn save(&self, path: &Path) -> OracleResult<()> {
        let io_err = |source| OracleError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = fs::File::create(path).map_err(io_err)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        info!(path = %path.display(), records = self.data.len(), "Probability cache saved");
        Ok(())
    }

    /// 파일에서 문서를 엄격하게 읽습니다. 레코드 하나라도 잘못되면 실패합니다.
    pub fn load(path: &Path) -> OracleResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| OracleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// 레인지와 기간으로 캐시 파일 이름을 만듭니다.
///
/// `0.005`, 2025-05-01..2025-06-01 → `cache_0_5pct_2025-05-01_2025-06-01.json`
pub fn cache_file_name(range: f64, from: NaiveDate, to: NaiveDate) -> String {
    let pct = format!("{:.1}", range * 100.0).replace('.', "_");
    format!(
        "cache_{}pct_{}_{}.json",
        pct,
        from.format("%Y-%m-%d"),
        to.format("%Y-%m-%d")
    )
}

/// 캐시 생성 결과 요약.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheSummary {
    pub records: usize,
    pub errors: usize,
    /// 양수 확률의 최솟값/평균/최댓값
    pub min_probability: Option<f64>,
    pub mean_probability: Option<f64>,
    pub max_probability: Option<f64>,
    /// 양수 확률 분포 `(하한, 상한, 개수)`, 구간은 `(하한, 상한]`
    pub histogram: Vec<(f64, f64, usize)>,
}

const HISTOGRAM_EDGES: [f64; 8] = [0.5, 0.6, 0.7, 0.8, 0.9, 0.95, 0.98, 1.0];

impl CacheSummary {
    fn from_records(records: &[ProbabilityRecord]) -> Self {
        let positive: Vec<f64> = records
            .iter()
            .map(|r| r.probability)
            .filter(|p| *p > 0.0)
            .collect();

        let mut summary = CacheSummary {
            records: records.len(),
            errors: records.iter().filter(|r| r.error.is_some()).count(),
            ..Default::default()
        };
        if positive.is_empty() {
            return summary;
        }

        summary.min_probability = positive.iter().copied().reduce(f64::min);
        summary.max_probability = positive.iter().copied().reduce(f64::max);
        summary.mean_probability = Some(positive.iter().sum::<f64>() / positive.len() as f64);

        let mut lo = 0.0;
        for hi in HISTOGRAM_EDGES {
            let count = positive.iter().filter(|p| **p > lo && **p <= hi).count();
            summary.histogram.push((lo, hi, count));
            lo = hi;
        }
        summary
    }
}

/// 라이브 소스로 캐시 문서를 만드는 빌더.
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    range: f64,
    window: MetricsWindow,
    warmup_minutes: u32,
    concurrency: usize,
}

impl CacheBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new(range: f64, window: MetricsWindow) -> Self {
        Self {
            range,
            window,
            warmup_minutes: 0,
            concurrency: 100,
        }
    }

    /// 시작 후 건너뛸 분 수.
    pub fn with_warmup_minutes(mut self, minutes: u32) -> Self {
        self.warmup_minutes = minutes;
        self
    }

    /// 동시 요청 수.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// 캐시할 분 틱의 질의 목록.
    ///
    /// 가격이나 지표가 없는 틱은 제외합니다. 마지막 1분 캔들 시각은 포함하지
    /// 않습니다.
    pub fn queries(&self, store: &CandleStore) -> Vec<OracleQuery> {
        let Some((start, end)) = store.time_range() else {
            return Vec::new();
        };

        let mut queries = Vec::new();
        let mut t = start + i64::from(self.warmup_minutes) * MS_PER_MINUTE;
        while t < end {
            if let (Some(price), Some(metrics)) =
                (store.price_at(t), store.metrics_with(t, self.window))
            {
                queries.push(OracleQuery {
                    timestamp: t,
                    price,
                    delta: metrics.delta,
                    ltma: metrics.ltma,
                    steps: self.window.steps,
                    range: self.range,
                    lower: price * (1.0 - self.range),
                    upper: price * (1.0 + self.range),
                });
            }
            t += MS_PER_MINUTE;
        }
        queries
    }

    /// 모든 틱의 확률을 가져와 문서를 만듭니다.
    ///
    /// 요청은 최대 `concurrency`개가 동시에 진행되며 결과 순서는 시각 순서를
    /// 유지합니다. `progress`는 `(완료, 전체)`로 호출됩니다.
    pub async fn build<S>(
        &self,
        store: &CandleStore,
        source: &S,
        period: CachePeriod,
        progress: Option<&(dyn Fn(usize, usize) + Send + Sync)>,
    ) -> (CacheDocument, CacheSummary)
    where
        S: ProbabilitySource + ?Sized,
    {
        let queries = self.queries(store);
        let total = queries.len();
        info!(
            range = self.range,
            requests = total,
            concurrency = self.concurrency,
            "Building probability cache"
        );

        let mut estimates = stream::iter(queries.iter().map(|q| source.fetch(q)))
            .buffered(self.concurrency);

        let mut data = Vec::with_capacity(total);
        let mut errors = 0usize;
        let mut done = 0usize;
        while let Some(estimate) = estimates.next().await {
            let query = &queries[done];
            if estimate.is_error() {
                errors += 1;
            }
            data.push(ProbabilityRecord::from_estimate(query, &estimate));
            done += 1;
            if let Some(report) = progress {
                report(done, total);
            }
        }

        if errors > 0 {
            warn!(errors, total, "Some probability requests failed");
        }

        let document = CacheDocument {
            range: self.range,
            steps: self.window.steps,
            period,
            created_at: Utc::now(),
            data,
        };
        let summary = CacheSummary::from_records(&document.data);
        (document, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn test_cache_file_name() {
        assert_eq!(
            cache_file_name(0.005, date(5, 1), date(6, 1)),
            "cache_0_5pct_2025-05-01_2025-06-01.json"
        );
        assert_eq!(
            cache_file_name(0.01, date(5, 1), date(5, 2)),
            "cache_1_0pct_2025-05-01_2025-05-02.json"
        );
    }

    #[test]
    fn test_document_wire_names() {
        let doc = CacheDocument {
            range: 0.005,
            steps: 10,
            period: CachePeriod {
                from: date(5, 1),
                to: date(5, 2),
            },
            created_at: Utc::now(),
            data: vec![],
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["period"]["from"], "2025-05-01");
    }

    #[test]
    fn test_summary_histogram() {
        let record = |p: f64, err: Option<&str>| ProbabilityRecord {
            timestamp: 0,
            price: 100.0,
            probability: p,
            delta: 0.0,
            ltma: 100.0,
            lower: 99.0,
            upper: 101.0,
            error: err.map(str::to_string),
        };
        let records = vec![
            record(0.0, Some("timeout")),
            record(0.55, None),
            record(0.85, None),
            record(0.96, None),
        ];
        let summary = CacheSummary::from_records(&records);
        assert_eq!(summary.records, 4);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.min_probability, Some(0.55));
        assert_eq!(summary.max_probability, Some(0.96));
        assert_eq!(summary.histogram.len(), 8);
        assert_eq!(summary.histogram[1], (0.5, 0.6, 1));
        assert_eq!(summary.histogram[6], (0.95, 0.98, 1));
    }
}
