//! 백테스터 핵심 에러 타입.
//!
//! 설정 및 파라미터 검증 단계에서 발생하는 에러를 정의합니다.
//! 이 에러들은 시뮬레이션 시작 전에 발생하며 호출자/설정 결함을 의미합니다.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 파라미터
    #[error("잘못된 파라미터: {0}")]
    InvalidParameter(String),

    /// 알 수 없는 청산 전략 이름
    #[error("알 수 없는 청산 전략: {0} (지원: cycle_timeout, no_sl, no_cycle)")]
    UnknownCloseStrategy(String),

    /// 알 수 없는 익절 정책 이름
    #[error("알 수 없는 익절 정책: {0} (지원: midpoint, fixed_percent, fixed_rr)")]
    UnknownTakeProfitPolicy(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// 시뮬레이션 시작 전에 중단해야 하는 설정 결함인지 확인합니다.
    pub fn is_config_defect(&self) -> bool {
        matches!(
            self,
            CoreError::Config(_)
                | CoreError::UnknownCloseStrategy(_)
                | CoreError::UnknownTakeProfitPolicy(_)
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}
