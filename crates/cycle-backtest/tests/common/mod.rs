//! 백테스트 통합 테스트 공용 픽스처.

#![allow(dead_code)]

use cycle_core::{
    Candle, CloseStrategyKind, ParameterSet, ProbabilityRecord, TakeProfitPolicy, MS_PER_MINUTE,
};
use cycle_data::{CandleStore, MetricsWindow};
use cycle_oracle::ReplayOracle;

/// 분마다 평탄한 1초 캔들. `overrides`는 같은 시각의 평탄 캔들보다 우선합니다.
pub fn minute_store(prices: &[f64], overrides: &[Candle]) -> CandleStore {
    let coarse = prices
        .iter()
        .enumerate()
        .map(|(m, &p)| Candle::flat(m as i64 * MS_PER_MINUTE, p))
        .collect();

    let mut fine: Vec<Candle> = overrides.to_vec();
    fine.extend(prices.iter().enumerate().flat_map(|(m, &p)| {
        (0..60).map(move |s| Candle::flat(m as i64 * MS_PER_MINUTE + s * 1_000, p))
    }));
    CandleStore::new(fine, coarse)
}

/// 결정적 의사 난수 (LCG).
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// [0, 1) 구간 값.
    pub fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// 분당 ±0.3% 랜덤 워크. 1초 캔들은 분 사이를 선형 보간하고 작은 꼬리를 붙입니다.
pub fn random_walk_store(minutes: usize, seed: u64) -> CandleStore {
    let mut rng = Lcg::new(seed);
    let mut prices = Vec::with_capacity(minutes + 1);
    let mut price = 2500.0;
    for _ in 0..=minutes {
        prices.push(price);
        price *= 1.0 + (rng.next_f64() - 0.5) * 0.006;
    }

    let coarse = (0..minutes)
        .map(|m| {
            let (a, b) = (prices[m], prices[m + 1]);
            Candle::new(m as i64 * MS_PER_MINUTE, b, a.max(b), a.min(b))
        })
        .collect();

    let mut fine = Vec::with_capacity(minutes * 60);
    for m in 0..minutes {
        let (a, b) = (prices[m], prices[m + 1]);
        for s in 0..60 {
            let close = a + (b - a) * s as f64 / 60.0;
            let wick = close * 0.0002 * rng.next_f64();
            fine.push(Candle::new(
                m as i64 * MS_PER_MINUTE + s * 1_000,
                close,
                close + wick,
                close - wick,
            ));
        }
    }
    CandleStore::new(fine, coarse)
}

pub fn window() -> MetricsWindow {
    MetricsWindow {
        steps: 2,
        delta_multiplier: 1,
        ltma_multiplier: 3,
    }
}

pub fn params(range: f64) -> ParameterSet {
    ParameterSet {
        range,
        cycle_time_minutes: 10,
        entry_long: 0.3,
        entry_short: 0.7,
        min_probability: 0.75,
        lock_before_end_secs: 60,
        take_profit: TakeProfitPolicy::FixedPercent { percent: 0.35 },
        close_strategy: CloseStrategyKind::CycleTimeout,
    }
}

/// 모든 분에 대한 재생 기록. 확률은 `probability(minute)`.
pub fn replay(
    store: &CandleStore,
    range: f64,
    probability: impl Fn(i64) -> f64,
) -> ReplayOracle {
    let records = store.coarse().iter().map(|c| ProbabilityRecord {
        timestamp: c.timestamp,
        price: c.close,
        probability: probability(c.timestamp / MS_PER_MINUTE),
        delta: 0.001,
        ltma: c.close,
        lower: c.close * (1.0 - range),
        upper: c.close * (1.0 + range),
        error: None,
    });
    ReplayOracle::from_records(range, records.collect::<Vec<_>>())
}

/// 의사 난수 확률 (0.5 ~ 1.0).
pub fn noisy_probability(seed: u64) -> impl Fn(i64) -> f64 {
    move |minute| {
        let mut rng = Lcg::new(seed ^ (minute as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        rng.next_f64();
        0.5 + rng.next_f64() * 0.5
    }
}
