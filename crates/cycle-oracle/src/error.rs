//! 오라클 에러 타입.

use std::path::PathBuf;
use thiserror::Error;

/// 오라클 관련 에러.
#[derive(Debug, Error)]
pub enum OracleError {
    /// 네트워크/연결 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 요청 타임아웃
    #[error("요청 타임아웃: {0}ms")]
    Timeout(u64),

    /// 2xx가 아닌 응답
    #[error("API 에러 HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// 응답 본문 파싱 실패
    #[error("잘못된 JSON 응답: {0}")]
    Parse(String),

    /// 캐시 문서 에러
    #[error("캐시 문서 에러: {0}")]
    Cache(String),

    /// 캐시 파일 입출력 에러
    #[error("캐시 파일 에러 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 비동기 런타임 없음
    #[error("런타임 핸들이 설정되지 않았습니다")]
    NoRuntime,
}

/// 오라클 작업을 위한 Result 타입.
pub type OracleResult<T> = Result<T, OracleError>;

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OracleError::Timeout(0)
        } else if err.is_decode() {
            OracleError::Parse(err.to_string())
        } else {
            OracleError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for OracleError {
    fn from(err: serde_json::Error) -> Self {
        OracleError::Parse(err.to_string())
    }
}
