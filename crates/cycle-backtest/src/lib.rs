//! 레인지 사이클 백테스트 엔진.
//!
//! 이 crate는 다음을 제공합니다:
//! - 사이클 상태 기계 (`CycleEngine`)
//! - 청산 전략 (`CloseStrategy`: cycle_timeout, no_sl, no_cycle)
//! - 익절가/슬리피지/수수료 손익 모델 (`PnlModel`)
//! - 파라미터 매트릭스 스윕과 결과 순위/민감도 분석 (`SweepRunner`)
//!
//! 한 파라미터 세트의 실행은 단일 스레드, 동기, 결정적입니다. 서로 다른
//! 파라미터 세트는 읽기 전용 저장소를 공유하며 병렬로 실행됩니다.

pub mod close;
pub mod engine;
pub mod error;
pub mod pnl;
pub mod sweep;

pub use close::{CloseOutcome, CloseStrategy, OpenPosition};
pub use engine::{CycleEngine, RunOutcome};
pub use error::{BacktestError, BacktestResult};
pub use pnl::{take_profit_price, PnlModel, Settlement, SlippageModel, SlippageTier};
pub use sweep::{
    OracleRegistry, SensitivityRow, SensitivityTable, SweepEntry, SweepMatrix, SweepReport,
    SweepRunner,
};
