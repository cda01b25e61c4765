//! 사이클 상태 기계.
//!
//! 한 파라미터 세트로 로드된 전체 기간을 1분 틱으로 훑습니다.
//!
//! ```text
//! Idle ──(확률 ≥ min)──▶ CycleActive ──(진입 조건)──▶ PositionOpen ──▶ Closed
//!   ▲                        │ (이탈 / 잠금 시각 도달)                    │
//!   └──────────── 다음 틱 = cycle_end ◀─────────────────────────────────┘
//! ```
//!
//! - **Idle**: 가격과 지표가 있는 틱마다 오라클에 질의합니다. 가격이나
//!   지표가 없는 틱은 카운터 변화 없이 건너뜁니다.
//! - **CycleActive**: 사이클 시작 시 고정한 경계 안에서 `lock` 이전 틱을
//!   시간 순으로 검사하고, 처음 진입 조건을 만족한 틱에서 포지션을 엽니다.
//!   가격이 경계를 벗어나면 그 사이클의 진입 탐색을 중단합니다.
//! - **Closed**: 거래 여부와 관계없이 다음 Idle 틱은 `cycle_end`입니다.
//!
//! 엔진은 I/O 없이 동기적으로 동작하며 같은 입력에 대해 항상 같은 거래
//! 목록을 만듭니다.

use serde::{Deserialize, Serialize};
use tracing::debug;

use cycle_core::{
    format_ts, OracleQuery, ParameterSet, RunCounters, StatsSummary, Trade, TradeSide,
    MS_PER_MINUTE,
};
use cycle_data::{CandleStore, FeatureGrid};
use cycle_oracle::ProbabilityOracle;

use crate::close::{CloseStrategy, OpenPosition};
use crate::error::{BacktestError, BacktestResult};
use crate::pnl::{take_profit_price, PnlModel};

/// 한 파라미터 세트의 실행 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub params: ParameterSet,
    pub trades: Vec<Trade>,
    pub summary: StatsSummary,
}

/// 사이클 엔진.
///
/// 저장소와 격자, 오라클은 읽기 전용으로 빌리며 실행 상태는 `run` 호출마다
/// 새로 만듭니다. 여러 스레드에서 같은 엔진으로 동시에 `run`을 호출해도
/// 됩니다.
pub struct CycleEngine<'a> {
    store: &'a CandleStore,
    grid: &'a FeatureGrid,
    oracle: &'a dyn ProbabilityOracle,
    pnl: PnlModel,
    max_hold_ms: i64,
}

/// 사이클 시작 시 고정되는 값.
#[derive(Debug, Clone, Copy)]
struct ActiveCycle {
    start: i64,
    end: i64,
    lock: i64,
    lower: f64,
    upper: f64,
    probability: f64,
}

impl<'a> CycleEngine<'a> {
    pub fn new(
        store: &'a CandleStore,
        grid: &'a FeatureGrid,
        oracle: &'a dyn ProbabilityOracle,
        pnl: PnlModel,
    ) -> Self {
        Self {
            store,
            grid,
            oracle,
            pnl,
            max_hold_ms: CloseStrategy::DEFAULT_MAX_HOLD_MS,
        }
    }

    /// no_cycle 전략의 최대 보유 시간을 설정합니다.
    pub fn with_max_hold_ms(mut self, max_hold_ms: i64) -> Self {
        self.max_hold_ms = max_hold_ms;
        self
    }

    pub fn pnl(&self) -> &PnlModel {
        &self.pnl
    }

    /// 파라미터 세트로 전체 기간을 시뮬레이션합니다.
    pub fn run(&self, params: &ParameterSet) -> BacktestResult<RunOutcome> {
        params.validate()?;
        if self.max_hold_ms <= 0 {
            return Err(BacktestError::Config(format!(
                "최대 보유 시간은 양수여야 합니다: {}ms",
                self.max_hold_ms
            )));
        }

        let strategy = CloseStrategy::from_kind(params.close_strategy, self.max_hold_ms);
        let mut counters = RunCounters::default();
        let mut trades = Vec::new();

        if self.grid.is_empty() {
            let summary = StatsSummary::from_trades(&trades, counters);
            return Ok(RunOutcome {
                params: *params,
                trades,
                summary,
            });
        }

        let end = self.grid.end();
        let mut t = self.grid.start();

        while t < end {
            let Some(cycle) = self.try_start_cycle(t, params, &mut counters) else {
                t += MS_PER_MINUTE;
                continue;
            };

            counters.cycles_started += 1;
            debug!(
                start = %format_ts(cycle.start),
                lower = cycle.lower,
                upper = cycle.upper,
                probability = cycle.probability,
                "Cycle started"
            );

            if let Some(trade) = self.seek_entry(&cycle, params, &strategy) {
                debug!(
                    side = %trade.side,
                    entry = trade.entry_price,
                    close = trade.fill_price,
                    reason = %trade.close_reason,
                    net_pnl = trade.net_pnl,
                    "Trade closed"
                );
                trades.push(trade);
            }

            t = cycle.end;
        }

        let summary = StatsSummary::from_trades(&trades, counters);
        debug!(
            params = %params.label(),
            oracle = self.oracle.name(),
            cycles = counters.cycles_started,
            trades = summary.total_trades,
            total_pnl = summary.total_pnl,
            "Run completed"
        );

        Ok(RunOutcome {
            params: *params,
            trades,
            summary,
        })
    }

    /// Idle 틱 처리. 확률이 충분하면 새 사이클을 돌려줍니다.
    fn try_start_cycle(
        &self,
        t: i64,
        params: &ParameterSet,
        counters: &mut RunCounters,
    ) -> Option<ActiveCycle> {
        let features = self.grid.at(t)?;
        let price = features.price?;
        let metrics = features.metrics?;

        let lower = price * (1.0 - params.range);
        let upper = price * (1.0 + params.range);
        let query = OracleQuery {
            timestamp: t,
            price,
            delta: metrics.delta,
            ltma: metrics.ltma,
            steps: self.grid.window().steps,
            range: params.range,
            lower,
            upper,
        };

        let estimate = self.oracle.estimate(&query)?;
        counters.oracle_checks += 1;
        // 오류 추정은 임계값과 관계없이 거부
        if estimate.is_error() {
            counters.oracle_errors += 1;
            counters.oracle_rejected += 1;
            return None;
        }
        if estimate.probability < params.min_probability {
            counters.oracle_rejected += 1;
            return None;
        }

        let end = t + params.cycle_ms();
        Some(ActiveCycle {
            start: t,
            end,
            lock: end - params.lock_ms(),
            lower,
            upper,
            probability: estimate.probability,
        })
    }

    /// CycleActive 틱 처리. 첫 진입 틱에서 포지션을 열고 청산까지 정산합니다.
    fn seek_entry(
        &self,
        cycle: &ActiveCycle,
        params: &ParameterSet,
        strategy: &CloseStrategy,
    ) -> Option<Trade> {
        let scan_end = cycle.lock.min(self.grid.end());
        let ticks = (cycle.start..scan_end).step_by(MS_PER_MINUTE as usize);

        for tick in ticks {
            let Some(price) = self.grid.at(tick).and_then(|f| f.price) else {
                continue;
            };
            if price < cycle.lower || price > cycle.upper {
                return None;
            }

            let position = (price - cycle.lower) / (cycle.upper - cycle.lower);
            let side = if position <= params.entry_long {
                TradeSide::Long
            } else if position >= params.entry_short {
                TradeSide::Short
            } else {
                continue;
            };

            return Some(self.open_and_close(
                cycle,
                params,
                strategy,
                tick,
                price,
                position,
                side,
            ));
        }
        None
    }

    #[allow(clippy::too_many_arguments)]
    fn open_and_close(
        &self,
        cycle: &ActiveCycle,
        params: &ParameterSet,
        strategy: &CloseStrategy,
        entry_timestamp: i64,
        entry_price: f64,
        entry_position: f64,
        side: TradeSide,
    ) -> Trade {
        let stop_loss = match side {
            TradeSide::Long => cycle.lower,
            TradeSide::Short => cycle.upper,
        };
        let take_profit =
            take_profit_price(params.take_profit, side, entry_price, cycle.lower, cycle.upper);

        let position = OpenPosition {
            side,
            entry_timestamp,
            entry_price,
            stop_loss,
            take_profit,
            cycle_end: cycle.end,
        };
        let outcome = strategy.check_close(&position, self.store);
        let settlement = self.pnl.settle(&position, &outcome);

        Trade {
            side,
            entry_timestamp,
            entry_price,
            stop_loss,
            take_profit,
            close_timestamp: outcome.close_timestamp,
            close_price: outcome.close_price,
            fill_price: settlement.fill_price,
            close_reason: outcome.close_reason,
            slippage_rate: settlement.slippage_rate,
            gross_pnl: settlement.gross_pnl,
            fees: settlement.fees,
            net_pnl: settlement.net_pnl,
            cycle_start: cycle.start,
            cycle_end: cycle.end,
            lower_bound: cycle.lower,
            upper_bound: cycle.upper,
            entry_position,
            probability: cycle.probability,
        }
    }
}
