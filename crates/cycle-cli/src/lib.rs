//! CLI 도구 모음.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 단일 파라미터 세트 시뮬레이션
//! - 파라미터 매트릭스 스윕과 결과 보고서
//! - 확률 캐시 생성
//! - 개별 거래 조회
//!
//! 모든 명령은 설정을 해석해 라이브러리를 호출하는 얇은 어댑터입니다.

pub mod commands;
pub mod report;
