//! 백테스터 전반에서 사용되는 공통 타입.

mod time;

pub use time::*;
