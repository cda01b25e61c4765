//! 백테스트 시뮬레이션을 위한 도메인 모델.

mod candle;
mod parameters;
mod probability;
mod statistics;
mod trade;

pub use candle::*;
pub use parameters::*;
pub use probability::*;
pub use statistics::*;
pub use trade::*;
