//! 데이터 모듈 오류 타입.

use std::path::PathBuf;
use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 파일 입출력 오류
    #[error("파일 읽기 실패 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON 파싱 오류
    #[error("파싱 오류 {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// 잘못된 데이터
    #[error("잘못된 데이터: {0}")]
    InvalidData(String),

    /// 로드 후 시계열이 비어 있음
    #[error("캔들 시계열이 비어 있습니다: {0}")]
    EmptySeries(String),
}

/// 데이터 작업을 위한 Result 타입.
pub type DataResult<T> = Result<T, DataError>;
