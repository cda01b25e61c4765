//! 파라미터 세트, 익절 정책, 청산 전략 종류.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};
use crate::types::{minutes_ms, seconds_ms};

/// 청산 전략 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseStrategyKind {
    /// 사이클 종료 시 타임아웃 청산, 손절/익절 모두 감시
    CycleTimeout,
    /// 손절 없이 익절만 감시, 사이클 종료 시 타임아웃 청산
    #[serde(rename = "no_sl")]
    NoStopLoss,
    /// 사이클 경계 무시, 최대 보유 시간까지 손절/익절 감시
    NoCycle,
}

impl CloseStrategyKind {
    /// 지원되는 모든 전략.
    pub const ALL: [CloseStrategyKind; 3] = [Self::CycleTimeout, Self::NoStopLoss, Self::NoCycle];

    /// 설정 파일에서 사용하는 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CycleTimeout => "cycle_timeout",
            Self::NoStopLoss => "no_sl",
            Self::NoCycle => "no_cycle",
        }
    }
}

impl fmt::Display for CloseStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloseStrategyKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cycle_timeout" => Ok(Self::CycleTimeout),
            "no_sl" => Ok(Self::NoStopLoss),
            "no_cycle" => Ok(Self::NoCycle),
            other => Err(CoreError::UnknownCloseStrategy(other.to_string())),
        }
    }
}

/// 익절가 계산 정책.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TakeProfitPolicy {
    /// 진입가와 반대편 경계의 중간
    Midpoint,
    /// 진입가 대비 고정 퍼센트 (0.35 = 0.35%)
    FixedPercent { percent: f64 },
    /// 손절 거리 × 손익비
    #[serde(rename = "fixed_rr")]
    FixedRiskReward { ratio: f64 },
}

impl Default for TakeProfitPolicy {
    fn default() -> Self {
        Self::FixedPercent { percent: 0.35 }
    }
}

impl TakeProfitPolicy {
    /// 이름과 수치로 정책을 만듭니다.
    ///
    /// `value`는 `fixed_percent`의 퍼센트, `fixed_rr`의 손익비로 쓰이며
    /// `midpoint`에서는 무시됩니다.
    pub fn from_name(name: &str, value: f64) -> CoreResult<Self> {
        let policy = match name.trim() {
            "midpoint" => Self::Midpoint,
            "fixed_percent" => Self::FixedPercent { percent: value },
            "fixed_rr" => Self::FixedRiskReward { ratio: value },
            other => return Err(CoreError::UnknownTakeProfitPolicy(other.to_string())),
        };
        policy.validate()?;
        Ok(policy)
    }

    /// 정책 이름.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Midpoint => "midpoint",
            Self::FixedPercent { .. } => "fixed_percent",
            Self::FixedRiskReward { .. } => "fixed_rr",
        }
    }

    /// 수치가 양수인지 검사합니다.
    pub fn validate(&self) -> CoreResult<()> {
        match *self {
            Self::FixedPercent { percent } if !(percent > 0.0) => Err(
                CoreError::InvalidParameter(format!("익절 퍼센트는 양수여야 합니다: {percent}")),
            ),
            Self::FixedRiskReward { ratio } if !(ratio > 0.0) => Err(
                CoreError::InvalidParameter(format!("손익비는 양수여야 합니다: {ratio}")),
            ),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TakeProfitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Midpoint => write!(f, "midpoint"),
            Self::FixedPercent { percent } => write!(f, "fixed_percent({percent}%)"),
            Self::FixedRiskReward { ratio } => write!(f, "fixed_rr(1:{ratio})"),
        }
    }
}

/// 한 번의 시뮬레이션 실행을 결정하는 파라미터 세트.
///
/// 생성 후 변경되지 않으며, 스윕의 한 조합에 해당합니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// 레인지 반폭 (비율)
    pub range: f64,
    /// 사이클 길이 (분)
    pub cycle_time_minutes: u32,
    /// 롱 진입 임계값 (position ≤ entry_long)
    pub entry_long: f64,
    /// 숏 진입 임계값 (position ≥ entry_short)
    pub entry_short: f64,
    /// 사이클 시작에 필요한 최소 확률
    pub min_probability: f64,
    /// 사이클 종료 전 진입 금지 구간 (초)
    pub lock_before_end_secs: u32,
    /// 익절 정책
    pub take_profit: TakeProfitPolicy,
    /// 청산 전략
    pub close_strategy: CloseStrategyKind,
}

impl ParameterSet {
    /// 사이클 길이 (밀리초).
    pub fn cycle_ms(&self) -> i64 {
        minutes_ms(self.cycle_time_minutes)
    }

    /// 진입 금지 구간 (밀리초).
    pub fn lock_ms(&self) -> i64 {
        seconds_ms(self.lock_before_end_secs)
    }

    /// 파라미터 조합의 유효성을 검사합니다.
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.range > 0.0 && self.range < 1.0) {
            return Err(CoreError::InvalidParameter(format!(
                "range는 (0, 1) 구간이어야 합니다: {}",
                self.range
            )));
        }
        if self.cycle_time_minutes == 0 {
            return Err(CoreError::InvalidParameter(
                "사이클 길이는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.lock_ms() >= self.cycle_ms() {
            return Err(CoreError::InvalidParameter(format!(
                "진입 금지 구간({}초)이 사이클 길이({}분) 이상입니다",
                self.lock_before_end_secs, self.cycle_time_minutes
            )));
        }
        if !(0.0..=1.0).contains(&self.min_probability) {
            return Err(CoreError::InvalidParameter(format!(
                "min_probability는 [0, 1] 구간이어야 합니다: {}",
                self.min_probability
            )));
        }
        if self.entry_long >= self.entry_short {
            return Err(CoreError::InvalidParameter(format!(
                "entry_long({})은 entry_short({})보다 작아야 합니다",
                self.entry_long, self.entry_short
            )));
        }
        self.take_profit.validate()
    }

    /// 결과 표에 쓰는 짧은 라벨.
    pub fn label(&self) -> String {
        format!(
            "R{:.2}% C{}m L{:.2}/S{:.2} P{:.2} K{}s {} {}",
            self.range * 100.0,
            self.cycle_time_minutes,
            self.entry_long,
            self.entry_short,
            self.min_probability,
            self.lock_before_end_secs,
            self.take_profit,
            self.close_strategy
        )
    }
}
