//! 확률 오라클 질의/응답 및 캐시 레코드.
//!
//! 오라클은 "현재 가격이 주어진 밴드 안에 머무를 확률"을 추정하는 외부
//! 서비스입니다. 엔진은 [`OracleQuery`]를 만들어 넘기고 [`OracleEstimate`]의
//! 확률만 읽습니다.

use serde::{Deserialize, Serialize};

/// 한 틱에 대한 오라클 질의.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OracleQuery {
    /// 틱 시각 (밀리초)
    pub timestamp: i64,
    /// 현재 가격
    pub price: f64,
    /// 평균 상대 변동폭
    pub delta: f64,
    /// 장기 이동평균
    pub ltma: f64,
    /// 리스크 모듈 스텝 수
    pub steps: u32,
    /// 레인지 반폭 (비율)
    pub range: f64,
    /// 하단 경계
    pub lower: f64,
    /// 상단 경계
    pub upper: f64,
}

impl OracleQuery {
    /// 반올림된 파라미터로 메모이제이션 키를 만듭니다.
    ///
    /// 가격/LTMA는 소수 둘째 자리, delta는 여섯째 자리까지 사용합니다.
    pub fn cache_key(&self) -> String {
        format!(
            "{:.2}_{:.6}_{:.2}_{}_{}",
            self.price, self.delta, self.ltma, self.steps, self.range
        )
    }
}

/// 오라클 추정 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleEstimate {
    /// 밴드 내 유지 확률 `[0, 1]`
    pub probability: f64,
    /// 오라클이 계산한 하단 경계
    pub lower_bound: Option<f64>,
    /// 오라클이 계산한 상단 경계
    pub upper_bound: Option<f64>,
    /// 기대 가격
    pub expected_price: Option<f64>,
    /// 실패 사유 (재시도 소진 등)
    pub error: Option<String>,
}

impl OracleEstimate {
    /// 확률만 있는 추정.
    pub fn from_probability(probability: f64) -> Self {
        Self {
            probability,
            lower_bound: None,
            upper_bound: None,
            expected_price: None,
            error: None,
        }
    }

    /// 실패 추정. 확률은 0으로 고정되어 진입이 일어나지 않습니다.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::from_probability(0.0)
        }
    }

    /// 실패 여부.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// 확률 캐시 문서의 레코드 한 건.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityRecord {
    pub timestamp: i64,
    pub price: f64,
    pub probability: f64,
    pub delta: f64,
    pub ltma: f64,
    pub lower: f64,
    pub upper: f64,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProbabilityRecord {
    /// 질의와 추정 결과로부터 레코드를 만듭니다.
    pub fn from_estimate(query: &OracleQuery, estimate: &OracleEstimate) -> Self {
        Self {
            timestamp: query.timestamp,
            price: query.price,
            probability: estimate.probability,
            delta: query.delta,
            ltma: query.ltma,
            lower: query.lower,
            upper: query.upper,
            error: estimate.error.clone(),
        }
    }

    /// 재생 가능한 레코드인지 검사합니다.
    pub fn is_well_formed(&self) -> bool {
        (0.0..=1.0).contains(&self.probability)
            && self.price.is_finite()
            && self.lower.is_finite()
            && self.upper.is_finite()
            && self.lower < self.upper
    }

    /// 엔진에 넘길 추정 결과.
    pub fn to_estimate(&self) -> OracleEstimate {
        OracleEstimate {
            probability: self.probability,
            lower_bound: Some(self.lower),
            upper_bound: Some(self.upper),
            expected_price: None,
            error: self.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> OracleQuery {
        OracleQuery {
            timestamp: 60_000,
            price: 2512.346,
            delta: 0.000_123_456_7,
            ltma: 2500.0,
            steps: 10,
            range: 0.005,
            lower: 2499.78,
            upper: 2524.91,
        }
    }

    #[test]
    fn test_cache_key_rounding() {
        assert_eq!(query().cache_key(), "2512.35_0.000123_2500.00_10_0.005");
    }

    #[test]
    fn test_failed_estimate_is_zero() {
        let estimate = OracleEstimate::failed("timeout");
        assert_eq!(estimate.probability, 0.0);
        assert!(estimate.is_error());
    }

    #[test]
    fn test_record_validation() {
        let record =
            ProbabilityRecord::from_estimate(&query(), &OracleEstimate::from_probability(0.9));
        assert!(record.is_well_formed());

        let bad = ProbabilityRecord {
            probability: 1.5,
            ..record.clone()
        };
        assert!(!bad.is_well_formed());

        let json = r#"{"timestamp":1,"price":100.0,"probability":0.8,"delta":0.001,
                       "ltma":99.0,"lower":99.5,"upper":100.5,"error":null}"#;
        let parsed: ProbabilityRecord = serde_json::from_str(json).unwrap();
        assert!(parsed.error.is_none());
        assert!(parsed.is_well_formed());
    }
}
