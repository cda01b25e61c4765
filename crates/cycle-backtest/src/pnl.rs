//! 손익 모델.
//!
//! 익절가 정책, 명목 금액 구간별 슬리피지, 진입/청산 양쪽 테이커 수수료를
//! 계산합니다.
//!
//! # 슬리피지
//!
//! 슬리피지는 손절 체결에만 적용되며 항상 불리한 방향입니다.
//! 롱 손절은 더 낮게, 숏 손절은 더 높게 체결됩니다.

use serde::{Deserialize, Serialize};

use cycle_core::{CloseReason, SimulationSettings, TakeProfitPolicy, TradeSide};

use crate::close::{CloseOutcome, OpenPosition};

/// 슬리피지 모델.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlippageModel {
    /// 고정 비율.
    Fixed { rate: f64 },

    /// 명목 금액 구간별 차등 비율.
    ///
    /// `notional <= threshold`를 만족하는 첫 구간의 비율을 사용하고,
    /// 어느 구간에도 속하지 않으면 `above`를 사용합니다.
    Tiered {
        tiers: Vec<SlippageTier>,
        above: f64,
    },
}

/// 구간별 슬리피지 설정.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlippageTier {
    /// 명목 금액 상한 (포함)
    pub threshold: f64,
    /// 슬리피지 비율 (0.0001 = 0.01%)
    pub rate: f64,
}

impl Default for SlippageModel {
    /// $10K / $50K / $100K 구간, 초과 시 0.05%.
    fn default() -> Self {
        Self::Tiered {
            tiers: vec![
                SlippageTier {
                    threshold: 10_000.0,
                    rate: 0.0001,
                },
                SlippageTier {
                    threshold: 50_000.0,
                    rate: 0.0002,
                },
                SlippageTier {
                    threshold: 100_000.0,
                    rate: 0.0003,
                },
            ],
            above: 0.0005,
        }
    }
}

impl SlippageModel {
    /// 슬리피지 없음.
    pub fn none() -> Self {
        Self::Fixed { rate: 0.0 }
    }

    /// 명목 금액에 해당하는 슬리피지 비율.
    pub fn rate(&self, notional: f64) -> f64 {
        match self {
            Self::Fixed { rate } => *rate,
            Self::Tiered { tiers, above } => tiers
                .iter()
                .find(|tier| notional <= tier.threshold)
                .map(|tier| tier.rate)
                .unwrap_or(*above),
        }
    }

    /// 불리한 방향으로 슬리피지를 적용한 체결가.
    pub fn apply(side: TradeSide, price: f64, rate: f64) -> f64 {
        match side {
            TradeSide::Long => price * (1.0 - rate),
            TradeSide::Short => price * (1.0 + rate),
        }
    }
}

/// 정책에 따른 익절가.
///
/// 손절가는 진입 방향 반대편 경계입니다 (롱은 `lower`, 숏은 `upper`).
pub fn take_profit_price(
    policy: TakeProfitPolicy,
    side: TradeSide,
    entry: f64,
    lower: f64,
    upper: f64,
) -> f64 {
    match (policy, side) {
        (TakeProfitPolicy::Midpoint, TradeSide::Long) => entry + (upper - entry) / 2.0,
        (TakeProfitPolicy::Midpoint, TradeSide::Short) => entry - (entry - lower) / 2.0,
        (TakeProfitPolicy::FixedPercent { percent }, TradeSide::Long) => {
            entry * (1.0 + percent / 100.0)
        }
        (TakeProfitPolicy::FixedPercent { percent }, TradeSide::Short) => {
            entry * (1.0 - percent / 100.0)
        }
        (TakeProfitPolicy::FixedRiskReward { ratio }, TradeSide::Long) => {
            entry + (entry - lower) * ratio
        }
        (TakeProfitPolicy::FixedRiskReward { ratio }, TradeSide::Short) => {
            entry - (upper - entry) * ratio
        }
    }
}

/// 한 거래의 정산 결과.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    /// 손익 계산에 사용한 체결가
    pub fill_price: f64,
    pub slippage_rate: f64,
    pub gross_pnl: f64,
    pub fees: f64,
    pub net_pnl: f64,
}

/// 포지션 크기, 수수료, 슬리피지로 거래를 정산합니다.
#[derive(Debug, Clone, PartialEq)]
pub struct PnlModel {
    pub margin: f64,
    pub leverage: f64,
    pub taker_fee: f64,
    pub slippage: SlippageModel,
}

impl PnlModel {
    pub fn new(margin: f64, leverage: f64, taker_fee: f64) -> Self {
        Self {
            margin,
            leverage,
            taker_fee,
            slippage: SlippageModel::default(),
        }
    }

    /// 슬리피지 모델을 설정합니다.
    pub fn with_slippage(mut self, slippage: SlippageModel) -> Self {
        self.slippage = slippage;
        self
    }

    pub fn from_settings(settings: &SimulationSettings) -> Self {
        Self::new(settings.margin, settings.leverage, settings.fees.taker)
    }

    /// 포지션 크기 (증거금 × 레버리지, 기초 자산 단위).
    pub fn position_size(&self) -> f64 {
        self.margin * self.leverage
    }

    /// 청산 결과를 정산합니다.
    pub fn settle(&self, position: &OpenPosition, outcome: &CloseOutcome) -> Settlement {
        let size = self.position_size();
        let entry = position.entry_price;

        let (fill_price, slippage_rate) = if outcome.close_reason == CloseReason::StopLoss {
            let rate = self.slippage.rate(entry * size);
            (
                SlippageModel::apply(position.side, outcome.close_price, rate),
                rate,
            )
        } else {
            (outcome.close_price, 0.0)
        };

        let gross_pnl = position.side.direction() * (fill_price - entry) * size;
        let fees = self.taker_fee * (entry + fill_price) * size;

        Settlement {
            fill_price,
            slippage_rate,
            gross_pnl,
            fees,
            net_pnl: gross_pnl - fees,
        }
    }
}
