//! # Cycle Core
//!
//! 레인지 사이클 백테스터의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 캔들 및 롤링 지표 표본
//! - 확률 오라클 질의/응답 및 캐시 레코드
//! - 파라미터 세트, 익절 정책, 청산 전략 종류
//! - 거래 기록 및 통계 요약
//! - 시뮬레이션 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
