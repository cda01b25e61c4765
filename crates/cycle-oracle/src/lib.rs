//! 확률 오라클.
//!
//! 엔진은 [`ProbabilityOracle`] 트레이트만 알고 구현체는 모릅니다.
//!
//! - [`ReplayOracle`]: 미리 계산된 캐시 문서를 시각으로 조회
//! - [`LiveOracle`]: HTTP 요청, 재시도/백오프, 파라미터 메모이제이션
//! - [`FixedOracle`]: 고정 확률 (드라이런, 테스트)
//! - [`CacheBuilder`]: 라이브 소스로 캐시 문서를 생성

pub mod cache;
pub mod error;
pub mod live;
pub mod oracle;
pub mod replay;
pub mod wire;

pub use cache::{cache_file_name, CacheBuilder, CacheDocument, CachePeriod, CacheSummary};
pub use error::{OracleError, OracleResult};
pub use live::{LiveOracle, LiveOracleConfig, LiveOracleStats};
pub use oracle::{FixedOracle, ProbabilityOracle, ProbabilitySource};
pub use replay::ReplayOracle;
pub use wire::{ProbabilityRequest, ProbabilityResponse};
