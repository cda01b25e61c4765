//! 시뮬레이션 거래 기록.
//!
//! 이 모듈은 거래 관련 타입을 정의합니다:
//! - `TradeSide` - 롱/숏 방향
//! - `CloseReason` - 청산 사유
//! - `Trade` - 청산까지 완료된 거래 한 건

use serde::{Deserialize, Serialize};
use std::fmt;

/// 포지션 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Long,
    Short,
}

impl TradeSide {
    /// 가격 변화에 곱할 부호 (롱 +1, 숏 -1).
    pub fn direction(&self) -> f64 {
        match self {
            TradeSide::Long => 1.0,
            TradeSide::Short => -1.0,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Long => write!(f, "LONG"),
            TradeSide::Short => write!(f, "SHORT"),
        }
    }
}

/// 청산 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// 손절
    #[serde(rename = "sl")]
    StopLoss,
    /// 익절
    #[serde(rename = "tp")]
    TakeProfit,
    /// 사이클 종료
    Timeout,
    /// 최대 보유 시간 도달
    MaxHold,
}

impl CloseReason {
    /// 보고서용 짧은 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::StopLoss => "sl",
            CloseReason::TakeProfit => "tp",
            CloseReason::Timeout => "timeout",
            CloseReason::MaxHold => "max_hold",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 청산까지 완료된 거래.
///
/// `close_price`는 탐지된 청산 가격이고, `fill_price`는 슬리피지를 반영한
/// 실제 체결 가격입니다. 손익과 수수료는 `fill_price`로 계산됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: TradeSide,
    pub entry_timestamp: i64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub close_timestamp: i64,
    pub close_price: f64,
    pub fill_price: f64,
    pub close_reason: CloseReason,
    /// 적용된 슬리피지율 (손절이 아니면 0)
    pub slippage_rate: f64,
    pub gross_pnl: f64,
    pub fees: f64,
    pub net_pnl: f64,
    /// 사이클 시작 시각
    pub cycle_start: i64,
    /// 사이클 종료 시각
    pub cycle_end: i64,
    /// 사이클 시작 시 고정된 하단 경계
    pub lower_bound: f64,
    /// 사이클 시작 시 고정된 상단 경계
    pub upper_bound: f64,
    /// 진입 시점의 레인지 내 위치 (0 = 하단, 1 = 상단)
    pub entry_position: f64,
    /// 사이클 시작을 허용한 오라클 확률
    pub probability: f64,
}

impl Trade {
    /// 순손익이 양수인 거래.
    pub fn is_win(&self) -> bool {
        self.net_pnl > 0.0
    }

    /// 보유 시간 (밀리초).
    pub fn holding_ms(&self) -> i64 {
        self.close_timestamp - self.entry_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_reason_serde_names() {
        let names: Vec<String> = [
            CloseReason::StopLoss,
            CloseReason::TakeProfit,
            CloseReason::Timeout,
            CloseReason::MaxHold,
        ]
        .iter()
        .map(|r| serde_json::to_string(r).unwrap())
        .collect();
        assert_eq!(names, ["\"sl\"", "\"tp\"", "\"timeout\"", "\"max_hold\""]);
    }

    #[test]
    fn test_side_direction() {
        assert_eq!(TradeSide::Long.direction(), 1.0);
        assert_eq!(TradeSide::Short.direction(), -1.0);
        assert_eq!(serde_json::to_string(&TradeSide::Short).unwrap(), "\"short\"");
    }
}
