//! 오라클 HTTP 요청/응답 형식.

use cycle_core::{OracleEstimate, OracleQuery};
use serde::{Deserialize, Serialize};

/// POST 요청 본문.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityRequest {
    pub steps: u32,
    pub range: f64,
    pub current_price: f64,
    pub lower: f64,
    pub upper: f64,
    pub delta: f64,
    pub ltma: f64,
}

impl From<&OracleQuery> for ProbabilityRequest {
    fn from(q: &OracleQuery) -> Self {
        Self {
            steps: q.steps,
            range: q.range,
            current_price: q.price,
            lower: q.lower,
            upper: q.upper,
            delta: q.delta,
            ltma: q.ltma,
        }
    }
}

/// 응답 본문. 확률이 없으면 0으로 간주합니다.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProbabilityResponse {
    #[serde(default)]
    pub probability_within_range: Option<f64>,
    #[serde(default)]
    pub lower_bound: Option<f64>,
    #[serde(default)]
    pub upper_bound: Option<f64>,
    #[serde(default)]
    pub expected_price: Option<f64>,
}

impl From<ProbabilityResponse> for OracleEstimate {
    fn from(r: ProbabilityResponse) -> Self {
        OracleEstimate {
            probability: r.probability_within_range.unwrap_or(0.0),
            lower_bound: r.lower_bound,
            upper_bound: r.upper_bound,
            expected_price: r.expected_price,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_field_names() {
        let query = OracleQuery {
            timestamp: 0,
            price: 100.0,
            delta: 0.001,
            ltma: 99.0,
            steps: 10,
            range: 0.01,
            lower: 99.0,
            upper: 101.0,
        };
        let json = serde_json::to_value(ProbabilityRequest::from(&query)).unwrap();
        assert_eq!(json["current_price"], 100.0);
        assert_eq!(json["steps"], 10);
        assert!(json.get("timestamp").is_none());
    }

    #[test]
    fn test_missing_probability_is_zero() {
        let response: ProbabilityResponse =
            serde_json::from_str(r#"{"lower_bound": 99.0}"#).unwrap();
        let estimate = OracleEstimate::from(response);
        assert_eq!(estimate.probability, 0.0);
        assert_eq!(estimate.lower_bound, Some(99.0));
    }
}
