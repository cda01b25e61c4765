//! 파라미터 세트별 실행 통계.
//!
//! 통계는 실행마다 새로 만들어지며 실행 간 공유되는 상태가 없습니다.

use serde::{Deserialize, Serialize};

use super::trade::{CloseReason, Trade, TradeSide};

/// 엔진이 실행 중 누적하는 카운터.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    /// 시작된 사이클 수
    pub cycles_started: u64,
    /// 오라클 질의 수
    pub oracle_checks: u64,
    /// 확률 미달 또는 오라클 오류로 거부된 틱 수
    pub oracle_rejected: u64,
    /// 오라클 오류가 표시된 추정 수 (거부에도 포함됨)
    pub oracle_errors: u64,
}

/// 청산 사유별 집계.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasonStats {
    pub count: u64,
    pub net_pnl: f64,
}

/// 청산 사유별 집계 묶음.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasonBreakdown {
    pub sl: ReasonStats,
    pub tp: ReasonStats,
    pub timeout: ReasonStats,
    pub max_hold: ReasonStats,
}

impl ReasonBreakdown {
    /// 사유별 집계를 조회합니다.
    pub fn get(&self, reason: CloseReason) -> &ReasonStats {
        match reason {
            CloseReason::StopLoss => &self.sl,
            CloseReason::TakeProfit => &self.tp,
            CloseReason::Timeout => &self.timeout,
            CloseReason::MaxHold => &self.max_hold,
        }
    }

    fn get_mut(&mut self, reason: CloseReason) -> &mut ReasonStats {
        match reason {
            CloseReason::StopLoss => &mut self.sl,
            CloseReason::TakeProfit => &mut self.tp,
            CloseReason::Timeout => &mut self.timeout,
            CloseReason::MaxHold => &mut self.max_hold,
        }
    }
}

/// 한 파라미터 세트의 통계 요약.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    /// 엔진 카운터
    #[serde(flatten)]
    pub counters: RunCounters,
    /// 총 거래 수
    pub total_trades: u64,
    pub long_trades: u64,
    pub short_trades: u64,
    /// 순손익 > 0 인 거래 수
    pub wins: u64,
    pub losses: u64,
    /// 승률 (%)
    pub win_rate: f64,
    /// 총 순손익
    pub total_pnl: f64,
    /// 총 총손익 (수수료 차감 전)
    pub total_gross_pnl: f64,
    /// 총 수수료
    pub total_fees: f64,
    /// 거래당 평균 순손익
    pub avg_pnl: f64,
    /// 최대 이익 거래
    pub max_win: f64,
    /// 최대 손실 거래
    pub max_loss: f64,
    /// 청산 사유별 집계
    pub by_reason: ReasonBreakdown,
}

impl StatsSummary {
    /// 거래 목록과 카운터로 요약을 계산합니다.
    pub fn from_trades(trades: &[Trade], counters: RunCounters) -> Self {
        let mut summary = StatsSummary {
            counters,
            ..Default::default()
        };
        if trades.is_empty() {
            return summary;
        }

        let mut max_win = f64::NEG_INFINITY;
        let mut max_loss = f64::INFINITY;

        for trade in trades {
            summary.total_trades += 1;
            match trade.side {
                TradeSide::Long => summary.long_trades += 1,
                TradeSide::Short => summary.short_trades += 1,
            }
            if trade.is_win() {
                summary.wins += 1;
            } else {
                summary.losses += 1;
            }
            summary.total_pnl += trade.net_pnl;
            summary.total_gross_pnl += trade.gross_pnl;
            summary.total_fees += trade.fees;
            max_win = max_win.max(trade.net_pnl);
            max_loss = max_loss.min(trade.net_pnl);

            let reason = summary.by_reason.get_mut(trade.close_reason);
            reason.count += 1;
            reason.net_pnl += trade.net_pnl;
        }

        let n = summary.total_trades as f64;
        summary.win_rate = summary.wins as f64 / n * 100.0;
        summary.avg_pnl = summary.total_pnl / n;
        summary.max_win = max_win;
        summary.max_loss = max_loss;
        summary
    }
}
