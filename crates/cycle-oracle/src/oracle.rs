//! 오라클 트레이트.
//!
//! 두 가지 경계가 있습니다:
//! - [`ProbabilityOracle`]: 결정적 시뮬레이션 코어가 호출하는 동기 인터페이스
//! - [`ProbabilitySource`]: 캐시 빌더가 병렬로 호출하는 비동기 인터페이스

use async_trait::async_trait;
use cycle_core::{OracleEstimate, OracleQuery};

/// 시뮬레이션 엔진이 사용하는 확률 오라클.
///
/// `None`은 "이 틱에 대한 데이터 없음"을 의미하며 엔진은 해당 틱을 거부가
/// 아닌 건너뛰기로 처리합니다. 실패는 확률 0의 추정으로 표현해야 합니다.
pub trait ProbabilityOracle: Send + Sync {
    /// 질의에 대한 확률을 추정합니다.
    fn estimate(&self, query: &OracleQuery) -> Option<OracleEstimate>;

    /// 로그에 표시할 이름.
    fn name(&self) -> &str;
}

/// 비동기 확률 소스.
#[async_trait]
pub trait ProbabilitySource: Send + Sync {
    /// 질의에 대한 확률을 가져옵니다. 실패는 확률 0 추정으로 반환합니다.
    async fn fetch(&self, query: &OracleQuery) -> OracleEstimate;
}

/// 항상 같은 확률을 반환하는 오라클.
#[derive(Debug, Clone, Copy)]
pub struct FixedOracle {
    probability: f64,
}

impl FixedOracle {
    /// 기본 드라이런 확률.
    pub const DEFAULT_PROBABILITY: f64 = 0.85;

    pub fn new(probability: f64) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl Default for FixedOracle {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PROBABILITY)
    }
}

impl ProbabilityOracle for FixedOracle {
    fn estimate(&self, _query: &OracleQuery) -> Option<OracleEstimate> {
        Some(OracleEstimate::from_probability(self.probability))
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

#[async_trait]
impl ProbabilitySource for FixedOracle {
    async fn fetch(&self, _query: &OracleQuery) -> OracleEstimate {
        OracleEstimate::from_probability(self.probability)
    }
}
