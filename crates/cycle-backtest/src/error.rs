//! 백테스트 에러 타입.

use cycle_core::CoreError;
use cycle_data::DataError;
use cycle_oracle::OracleError;
use thiserror::Error;

/// 백테스트 관련 에러.
#[derive(Debug, Error)]
pub enum BacktestError {
    /// 설정 에러 (시뮬레이션 시작 전 중단)
    #[error("설정 에러: {0}")]
    Config(String),

    /// 파라미터/도메인 에러
    #[error(transparent)]
    Core(#[from] CoreError),

    /// 데이터 에러
    #[error(transparent)]
    Data(#[from] DataError),

    /// 오라클 에러
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// 레인지에 해당하는 오라클 없음
    #[error("레인지 {range}에 대한 확률 오라클이 없습니다")]
    MissingOracle { range: f64 },

    /// 실행 중 예기치 않은 중단
    #[error("실행 실패: {0}")]
    Aborted(String),
}

/// 백테스트 작업을 위한 Result 타입.
pub type BacktestResult<T> = Result<T, BacktestError>;

impl BacktestError {
    /// 스윕 전체를 중단해야 하는 설정 결함인지 확인합니다.
    pub fn is_config_defect(&self) -> bool {
        match self {
            BacktestError::Config(_) => true,
            BacktestError::Core(e) => e.is_config_defect(),
            _ => false,
        }
    }
}
