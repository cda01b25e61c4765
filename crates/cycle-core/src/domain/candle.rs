//! 캔들과 롤링 지표 표본.

use serde::{Deserialize, Serialize};

/// 가격 캔들 (1초 또는 1분 해상도).
///
/// 시각은 epoch 기준 밀리초입니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시작 시각 (밀리초)
    pub timestamp: i64,
    /// 종가
    pub close: f64,
    /// 고가
    pub high: f64,
    /// 저가
    pub low: f64,
}

impl Candle {
    /// 새 캔들을 생성합니다.
    pub fn new(timestamp: i64, close: f64, high: f64, low: f64) -> Self {
        Self {
            timestamp,
            close,
            high,
            low,
        }
    }

    /// 고가와 저가가 모두 종가인 평탄한 캔들.
    pub fn flat(timestamp: i64, price: f64) -> Self {
        Self::new(timestamp, price, price, price)
    }

    /// 중간 가격 `(high + low) / 2`.
    pub fn mid_price(&self) -> f64 {
        (self.high + self.low) / 2.0
    }
}

/// 파일에서 읽은 원시 캔들 레코드.
///
/// 데이터 파일에는 `timestamp: null`이나 누락 필드가 섞여 있을 수 있어
/// 모든 필드를 선택적으로 받은 뒤 [`RawCandle::into_candle`]로 걸러냅니다.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCandle {
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
}

impl RawCandle {
    /// 유효한 캔들로 변환합니다. 필드가 없거나 유한하지 않으면 `None`.
    pub fn into_candle(self) -> Option<Candle> {
        let candle = Candle::new(self.timestamp?, self.close?, self.high?, self.low?);
        let finite = candle.close.is_finite() && candle.high.is_finite() && candle.low.is_finite();
        finite.then_some(candle)
    }
}

/// 특정 시각의 롤링 지표.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    /// 평균 상대 변동폭
    pub delta: f64,
    /// 장기 이동평균 (중간 가격 기준)
    pub ltma: f64,
}
