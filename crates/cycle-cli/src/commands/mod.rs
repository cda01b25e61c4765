//! CLI 명령어 구현 모듈.

pub mod cache;
pub mod common;
pub mod simulate;
pub mod sweep;
pub mod trades;
