//! 청산 전략.
//!
//! 파라미터 세트마다 한 번 선택되어 엔진에 주입됩니다. 모든 전략은
//! 1초 캔들에서 손절/익절 레벨의 첫 도달 시점을 찾고, 둘 다 같은 캔들에서
//! 도달하면 손절을 우선합니다.

use cycle_core::{hours_ms, CloseReason, CloseStrategyKind, TradeSide};
use cycle_data::{CandleStore, HitDirection, PriceHit};

/// 청산 판정에 필요한 열린 포지션 정보.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenPosition {
    pub side: TradeSide,
    pub entry_timestamp: i64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub cycle_end: i64,
}

/// 청산 결과.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloseOutcome {
    pub close_timestamp: i64,
    pub close_price: f64,
    pub close_reason: CloseReason,
}

/// 청산 전략.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseStrategy {
    /// `[진입, 사이클 종료]`에서 손절/익절, 없으면 사이클 종료 시 타임아웃
    CycleTimeout,
    /// `[진입, 사이클 종료]`에서 익절만, 없으면 사이클 종료 시 타임아웃
    NoStopLoss,
    /// `[진입, 진입 + 최대 보유]`에서 손절/익절, 없으면 최대 보유 시점 강제 청산
    NoCycle { max_hold_ms: i64 },
}

impl CloseStrategy {
    /// 기본 최대 보유 시간 (24시간).
    pub const DEFAULT_MAX_HOLD_MS: i64 = 24 * 60 * 60 * 1000;

    /// 전략 종류로 생성합니다.
    pub fn from_kind(kind: CloseStrategyKind, max_hold_ms: i64) -> Self {
        match kind {
            CloseStrategyKind::CycleTimeout => CloseStrategy::CycleTimeout,
            CloseStrategyKind::NoStopLoss => CloseStrategy::NoStopLoss,
            CloseStrategyKind::NoCycle => CloseStrategy::NoCycle { max_hold_ms },
        }
    }

    /// 최대 보유 시간을 시간 단위로 받아 생성합니다.
    pub fn with_max_hold_hours(kind: CloseStrategyKind, hours: u32) -> Self {
        Self::from_kind(kind, hours_ms(hours))
    }

    pub fn kind(&self) -> CloseStrategyKind {
        match self {
            CloseStrategy::CycleTimeout => CloseStrategyKind::CycleTimeout,
            CloseStrategy::NoStopLoss => CloseStrategyKind::NoStopLoss,
            CloseStrategy::NoCycle { .. } => CloseStrategyKind::NoCycle,
        }
    }

    /// 포지션이 언제, 어떤 가격으로, 왜 청산되는지 판정합니다.
    pub fn check_close(&self, position: &OpenPosition, store: &CandleStore) -> CloseOutcome {
        match *self {
            CloseStrategy::CycleTimeout => {
                first_exit(position, store, position.cycle_end, true).unwrap_or_else(|| {
                    forced_close(position, store, position.cycle_end, CloseReason::Timeout)
                })
            }
            CloseStrategy::NoStopLoss => {
                first_exit(position, store, position.cycle_end, false).unwrap_or_else(|| {
                    forced_close(position, store, position.cycle_end, CloseReason::Timeout)
                })
            }
            CloseStrategy::NoCycle { max_hold_ms } => {
                let horizon = position.entry_timestamp + max_hold_ms;
                first_exit(position, store, horizon, true).unwrap_or_else(|| {
                    forced_close(position, store, horizon, CloseReason::MaxHold)
                })
            }
        }
    }
}

/// 방향별 (손절 도달 방향, 익절 도달 방향).
fn hit_directions(side: TradeSide) -> (HitDirection, HitDirection) {
    match side {
        TradeSide::Long => (HitDirection::Below, HitDirection::Above),
        TradeSide::Short => (HitDirection::Above, HitDirection::Below),
    }
}

fn first_exit(
    position: &OpenPosition,
    store: &CandleStore,
    window_end: i64,
    watch_stop_loss: bool,
) -> Option<CloseOutcome> {
    let (sl_dir, tp_dir) = hit_directions(position.side);
    let start = position.entry_timestamp;

    let sl = watch_stop_loss
        .then(|| store.find_first_hit(start, window_end, position.stop_loss, sl_dir))
        .flatten();
    let tp = store.find_first_hit(start, window_end, position.take_profit, tp_dir);

    let as_outcome = |hit: PriceHit, reason| CloseOutcome {
        close_timestamp: hit.timestamp,
        close_price: hit.price,
        close_reason: reason,
    };

    match (sl, tp) {
        (Some(sl), Some(tp)) if sl.timestamp <= tp.timestamp => {
            Some(as_outcome(sl, CloseReason::StopLoss))
        }
        (_, Some(tp)) => Some(as_outcome(tp, CloseReason::TakeProfit)),
        (Some(sl), None) => Some(as_outcome(sl, CloseReason::StopLoss)),
        (None, None) => None,
    }
}

/// 지정 시각의 가격으로 강제 청산. 가격이 없으면 진입가로 청산합니다.
fn forced_close(
    position: &OpenPosition,
    store: &CandleStore,
    at: i64,
    reason: CloseReason,
) -> CloseOutcome {
    CloseOutcome {
        close_timestamp: at,
        close_price: store.price_at(at).unwrap_or(position.entry_price),
        close_reason: reason,
    }
}
