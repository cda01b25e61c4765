//! 불변 캔들 저장소.
//!
//! 1초(fine) 시계열과 1분(coarse) 시계열을 각각 시각 오름차순으로 보관합니다.
//! 생성 시 정렬과 중복 제거를 마친 뒤에는 변경되지 않으므로 여러 스레드가
//! 공유 참조로 동시에 조회할 수 있습니다.

use cycle_core::{Candle, MetricsSample};

/// 가격 도달 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitDirection {
    /// 고가가 레벨 이상
    Above,
    /// 저가가 레벨 이하
    Below,
}

/// 레벨 도달 지점. 가격은 캔들 극값이 아닌 도달한 레벨입니다.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceHit {
    pub timestamp: i64,
    pub price: f64,
}

/// delta/LTMA 윈도우 설정.
///
/// LTMA는 `steps × ltma_multiplier`개, delta는 `steps × delta_multiplier`개의
/// 변화율 평균입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsWindow {
    pub steps: u32,
    pub delta_multiplier: u32,
    pub ltma_multiplier: u32,
}

impl MetricsWindow {
    /// LTMA에 필요한 1분 캔들 수.
    pub fn ltma_len(&self) -> usize {
        self.steps as usize * self.ltma_multiplier as usize
    }

    /// delta 계산에 쓰는 변화율 개수.
    pub fn delta_len(&self) -> usize {
        self.steps as usize * self.delta_multiplier as usize
    }
}

impl Default for MetricsWindow {
    fn default() -> Self {
        Self {
            steps: 10,
            delta_multiplier: 2,
            ltma_multiplier: 15,
        }
    }
}

/// 두 해상도의 캔들 시계열.
#[derive(Debug, Clone, Default)]
pub struct CandleStore {
    fine: Vec<Candle>,
    coarse: Vec<Candle>,
}

impl CandleStore {
    /// 저장소를 생성합니다. 입력은 정렬되고 같은 시각은 첫 레코드만 남습니다.
    pub fn new(fine: Vec<Candle>, coarse: Vec<Candle>) -> Self {
        Self {
            fine: normalize(fine).0,
            coarse: normalize(coarse).0,
        }
    }

    /// 1초 시계열.
    pub fn fine(&self) -> &[Candle] {
        &self.fine
    }

    /// 1분 시계열.
    pub fn coarse(&self) -> &[Candle] {
        &self.coarse
    }

    /// 두 시계열 중 하나라도 비어 있는지.
    pub fn is_empty(&self) -> bool {
        self.fine.is_empty() || self.coarse.is_empty()
    }

    /// 1분 시계열의 첫/마지막 시각.
    pub fn time_range(&self) -> Option<(i64, i64)> {
        Some((self.coarse.first()?.timestamp, self.coarse.last()?.timestamp))
    }

    /// 가장 가까운 1초 캔들의 종가.
    ///
    /// 두 캔들 사이에 놓이면 시간 거리가 더 가까운 쪽을, 거리가 같으면
    /// 앞선 캔들을 사용합니다.
    pub fn price_at(&self, timestamp: i64) -> Option<f64> {
        let idx = self.fine.partition_point(|c| c.timestamp < timestamp);

        let after = self.fine.get(idx);
        let before = idx.checked_sub(1).and_then(|i| self.fine.get(i));

        let candle = match (before, after) {
            (Some(b), Some(a)) => {
                if timestamp - b.timestamp <= a.timestamp - timestamp {
                    b
                } else {
                    a
                }
            }
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (None, None) => return None,
        };
        Some(candle.close)
    }

    /// `timestamp` 직전 1분 캔들로 delta와 LTMA를 계산합니다.
    ///
    /// `timestamp` 이전(미만)의 캔들이 `steps × ltma_multiplier`개보다 적으면
    /// `None`을 반환합니다. 호출자는 해당 틱을 건너뛰어야 합니다.
    pub fn metrics_at(
        &self,
        timestamp: i64,
        steps: u32,
        delta_multiplier: u32,
        ltma_multiplier: u32,
    ) -> Option<MetricsSample> {
        self.metrics_with(
            timestamp,
            MetricsWindow {
                steps,
                delta_multiplier,
                ltma_multiplier,
            },
        )
    }

    /// [`MetricsWindow`]로 지표를 계산합니다.
    pub fn metrics_with(&self, timestamp: i64, window: MetricsWindow) -> Option<MetricsSample> {
        let x = window.ltma_len();
        let idx = self.coarse.partition_point(|c| c.timestamp < timestamp);
        if x == 0 || idx < x {
            return None;
        }

        let mids: Vec<f64> = self.coarse[idx - x..idx]
            .iter()
            .map(Candle::mid_price)
            .collect();
        let ltma = mids.iter().sum::<f64>() / x as f64;

        let delta_start = mids.len().saturating_sub(window.delta_len() + 1);
        let (sum, count) = mids[delta_start..]
            .windows(2)
            .fold((0.0, 0usize), |(sum, count), w| {
                (sum + ((w[1] - w[0]) / w[0]).abs(), count + 1)
            });
        let delta = if count > 0 { sum / count as f64 } else { 0.0 };

        Some(MetricsSample { delta, ltma })
    }

    /// `[start, end]` 구간에서 레벨에 처음 도달한 1초 캔들을 찾습니다.
    pub fn find_first_hit(
        &self,
        start: i64,
        end: i64,
        level: f64,
        direction: HitDirection,
    ) -> Option<PriceHit> {
        self.window(start, end)
            .iter()
            .find(|c| match direction {
                HitDirection::Above => c.high >= level,
                HitDirection::Below => c.low <= level,
            })
            .map(|c| PriceHit {
                timestamp: c.timestamp,
                price: level,
            })
    }

    /// `[start, end]` 구간의 (최저 저가, 최고 고가).
    pub fn range_extremes(&self, start: i64, end: i64) -> Option<(f64, f64)> {
        let window = self.window(start, end);
        if window.is_empty() {
            return None;
        }
        Some(window.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(min, max), c| (min.min(c.low), max.max(c.high)),
        ))
    }

    /// `[start, end]` 구간의 1초 캔들 슬라이스.
    fn window(&self, start: i64, end: i64) -> &[Candle] {
        if start > end {
            return &[];
        }
        let from = self.fine.partition_point(|c| c.timestamp < start);
        let to = self.fine.partition_point(|c| c.timestamp <= end);
        &self.fine[from..to]
    }
}

/// 시각 오름차순 정렬 후 중복 시각을 제거합니다. (정렬된 캔들, 제거된 개수)
///
/// 안정 정렬이므로 같은 시각 중 입력에서 먼저 나온 레코드가 남습니다.
pub(crate) fn normalize(mut candles: Vec<Candle>) -> (Vec<Candle>, usize) {
    candles.sort_by_key(|c| c.timestamp);
    let before = candles.len();
    candles.dedup_by_key(|c| c.timestamp);
    let removed = before - candles.len();
    (candles, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fine_store(points: &[(i64, f64)]) -> CandleStore {
        let fine = points.iter().map(|&(ts, p)| Candle::flat(ts, p)).collect();
        CandleStore::new(fine, vec![Candle::flat(0, 1.0)])
    }

    #[test]
    fn test_price_at_nearest() {
        let store = fine_store(&[(1_000, 10.0), (2_000, 20.0), (4_000, 40.0)]);

        assert_eq!(store.price_at(1_000), Some(10.0));
        assert_eq!(store.price_at(1_400), Some(10.0));
        assert_eq!(store.price_at(1_600), Some(20.0));
        // 거리가 같으면 앞선 캔들
        assert_eq!(store.price_at(3_000), Some(20.0));
        assert_eq!(store.price_at(0), Some(10.0));
        assert_eq!(store.price_at(99_000), Some(40.0));
    }

    #[test]
    fn test_price_at_empty() {
        let store = CandleStore::default();
        assert_eq!(store.price_at(1_000), None);
        assert!(store.is_empty());
        assert!(store.time_range().is_none());
    }

    #[test]
    fn test_new_sorts_and_dedups() {
        let fine = vec![
            Candle::flat(3_000, 3.0),
            Candle::flat(1_000, 1.0),
            Candle::flat(3_000, 99.0),
        ];
        let store = CandleStore::new(fine, vec![]);
        let ts: Vec<i64> = store.fine().iter().map(|c| c.timestamp).collect();
        assert_eq!(ts, vec![1_000, 3_000]);
        assert_eq!(store.fine()[1].close, 3.0);
    }

    #[test]
    fn test_metrics_insufficient_history() {
        let coarse: Vec<Candle> = (0..5).map(|i| Candle::flat(i * 60_000, 100.0)).collect();
        let store = CandleStore::new(vec![], coarse);

        // steps=2, ltma=2 → 4개 필요. 시각 4분 이전에는 4개(0..3분)
        assert!(store.metrics_at(3 * 60_000, 2, 1, 2).is_none());
        assert!(store.metrics_at(4 * 60_000, 2, 1, 2).is_some());
    }

    #[test]
    fn test_metrics_values() {
        // 중간 가격: 100, 110, 99, 99
        let coarse = vec![
            Candle::new(0, 100.0, 101.0, 99.0),
            Candle::new(60_000, 110.0, 111.0, 109.0),
            Candle::new(120_000, 99.0, 100.0, 98.0),
            Candle::new(180_000, 99.0, 99.5, 98.5),
            Candle::new(240_000, 50.0, 50.0, 50.0),
        ];
        let store = CandleStore::new(vec![], coarse);

        let m = store.metrics_at(240_000, 2, 1, 2).unwrap();
        assert!((m.ltma - 102.0).abs() < 1e-9);
        // 마지막 3개 가격(110, 99, 99)의 변화율 2개
        let expected = ((99.0f64 - 110.0) / 110.0).abs() / 2.0;
        assert!((m.delta - expected).abs() < 1e-12);
    }

    #[test]
    fn test_find_first_hit() {
        let fine = vec![
            Candle::new(1_000, 100.0, 100.2, 99.8),
            Candle::new(2_000, 100.5, 101.1, 100.0),
            Candle::new(3_000, 99.0, 100.0, 98.9),
            Candle::new(4_000, 102.0, 102.0, 101.5),
        ];
        let store = CandleStore::new(fine, vec![]);

        let hit = store
            .find_first_hit(1_000, 4_000, 101.0, HitDirection::Above)
            .unwrap();
        assert_eq!(hit.timestamp, 2_000);
        assert_eq!(hit.price, 101.0);

        let hit = store
            .find_first_hit(1_000, 4_000, 99.0, HitDirection::Below)
            .unwrap();
        assert_eq!(hit.timestamp, 3_000);

        // 구간 밖은 보지 않음
        assert!(store
            .find_first_hit(1_000, 2_500, 99.0, HitDirection::Below)
            .is_none());
        assert!(store
            .find_first_hit(3_500, 2_000, 0.0, HitDirection::Above)
            .is_none());
    }

    #[test]
    fn test_range_extremes() {
        let fine = vec![
            Candle::new(1_000, 100.0, 100.2, 99.8),
            Candle::new(2_000, 100.5, 101.1, 100.0),
        ];
        let store = CandleStore::new(fine, vec![]);
        assert_eq!(store.range_extremes(0, 5_000), Some((99.8, 101.1)));
        assert_eq!(store.range_extremes(5_000, 6_000), None);
    }
}
