//! 캐시 문서 재생 오라클.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use cycle_core::{OracleEstimate, OracleQuery, ProbabilityRecord};

use crate::cache::{CacheDocument, CachePeriod};
use crate::error::{OracleError, OracleResult};
use crate::oracle::ProbabilityOracle;

/// 레코드를 개별 검증하기 위한 느슨한 문서 형식.
#[derive(Debug, Deserialize)]
struct LenientDocument {
    range: f64,
    #[serde(default)]
    steps: Option<u32>,
    #[serde(default)]
    period: Option<CachePeriod>,
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

/// 시각으로 캐시 레코드를 조회하는 오라클.
///
/// 캐시에 없는 시각은 `None`(데이터 없음)으로 응답합니다.
#[derive(Debug, Clone)]
pub struct ReplayOracle {
    range: f64,
    steps: Option<u32>,
    period: Option<CachePeriod>,
    records: HashMap<i64, ProbabilityRecord>,
    anomalies: usize,
}

impl ReplayOracle {
    /// 레코드 목록으로 생성합니다. 잘못된 레코드는 버리고 개수만 셉니다.
    ///
    /// 같은 시각이 여러 번 나오면 마지막 레코드가 남습니다.
    pub fn from_records(range: f64, records: impl IntoIterator<Item = ProbabilityRecord>) -> Self {
        let mut oracle = Self {
            range,
            steps: None,
            period: None,
            records: HashMap::new(),
            anomalies: 0,
        };
        for record in records {
            oracle.insert(record);
        }
        oracle
    }

    /// 엄격하게 파싱된 문서로 생성합니다.
    pub fn from_document(document: CacheDocument) -> Self {
        let mut oracle = Self::from_records(document.range, document.data);
        oracle.steps = Some(document.steps);
        oracle.period = Some(document.period);
        oracle
    }

    /// JSON 문자열에서 생성합니다.
    ///
    /// 문서 구조가 잘못되면 에러, 개별 레코드가 잘못되면 버리고 계속합니다.
    pub fn from_json(json: &str) -> OracleResult<Self> {
        let doc: LenientDocument = serde_json::from_str(json)
            .map_err(|e| OracleError::Cache(format!("문서 구조 오류: {e}")))?;

        let mut oracle = Self::from_records(doc.range, std::iter::empty());
        oracle.steps = doc.steps;
        oracle.period = doc.period;
        for value in doc.data {
            match serde_json::from_value::<ProbabilityRecord>(value) {
                Ok(record) => oracle.insert(record),
                Err(_) => oracle.anomalies += 1,
            }
        }

        if oracle.anomalies > 0 {
            warn!(
                anomalies = oracle.anomalies,
                kept = oracle.records.len(),
                "Malformed cache records dropped"
            );
        }
        Ok(oracle)
    }

    /// 캐시 파일을 읽습니다.
    pub fn load(path: &Path) -> OracleResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| OracleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let oracle = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            range = oracle.range,
            records = oracle.records.len(),
            "Probability cache loaded"
        );
        Ok(oracle)
    }

    fn insert(&mut self, record: ProbabilityRecord) {
        if record.is_well_formed() {
            self.records.insert(record.timestamp, record);
        } else {
            self.anomalies += 1;
        }
    }

    /// 캐시를 만든 레인지.
    pub fn range(&self) -> f64 {
        self.range
    }

    /// 캐시를 만든 리스크 모듈 스텝 수.
    pub fn steps(&self) -> Option<u32> {
        self.steps
    }

    pub fn period(&self) -> Option<CachePeriod> {
        self.period
    }

    /// 보관 중인 레코드 수.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 버려진 잘못된 레코드 수.
    pub fn anomalies(&self) -> usize {
        self.anomalies
    }

    /// 레인지가 일치하는지 (부동소수 오차 허용).
    pub fn matches_range(&self, range: f64) -> bool {
        (self.range - range).abs() < 1e-12
    }
}

impl ProbabilityOracle for ReplayOracle {
    fn estimate(&self, query: &OracleQuery) -> Option<OracleEstimate> {
        self.records.get(&query.timestamp).map(ProbabilityRecord::to_estimate)
    }

    fn name(&self) -> &str {
        "replay"
    }
}
