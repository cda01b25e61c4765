//! 캔들 데이터 관리.
//!
//! 이 crate는 다음을 제공합니다:
//! - 1초/1분 두 해상도의 불변 캔들 저장소 (`CandleStore`)
//! - 최근접 시각 가격 조회, delta/LTMA 롤링 지표, 가격 도달 탐색
//! - 분 단위 틱 격자에 미리 계산된 가격/지표 (`FeatureGrid`)
//! - 일자별 JSON 캔들 파일 로더

pub mod error;
pub mod grid;
pub mod loader;
pub mod store;

pub use error::{DataError, DataResult};
pub use grid::{FeatureGrid, TickFeatures};
pub use loader::{CandleLoader, LoadReport, Resolution, SeriesReport};
pub use store::{CandleStore, HitDirection, MetricsWindow, PriceHit};
