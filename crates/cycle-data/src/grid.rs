//! 분 단위 틱 격자의 가격/지표 사전 계산.
//!
//! 엔진의 모든 틱은 첫 1분 캔들 시각에서 1분 간격으로 놓입니다. 스윕은 같은
//! 데이터로 수천 번 실행되므로 격자 위의 가격과 delta/LTMA를 한 번만 계산해
//! 모든 실행이 읽기 전용으로 공유합니다.

use cycle_core::{MetricsSample, MS_PER_MINUTE};
use tracing::debug;

use crate::store::{CandleStore, MetricsWindow};

/// 격자 한 칸의 값.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickFeatures {
    pub price: Option<f64>,
    pub metrics: Option<MetricsSample>,
}

/// `[start, end]` 구간의 분 단위 격자.
#[derive(Debug, Clone)]
pub struct FeatureGrid {
    start: i64,
    end: i64,
    window: MetricsWindow,
    points: Vec<TickFeatures>,
}

impl FeatureGrid {
    /// 저장소의 1분 시계열 범위 전체로 격자를 만듭니다.
    pub fn build(store: &CandleStore, window: MetricsWindow) -> Self {
        let Some((start, end)) = store.time_range() else {
            return Self {
                start: 0,
                end: -1,
                window,
                points: Vec::new(),
            };
        };

        let len = ((end - start) / MS_PER_MINUTE + 1) as usize;
        let points: Vec<TickFeatures> = (0..len)
            .map(|i| {
                let ts = start + i as i64 * MS_PER_MINUTE;
                TickFeatures {
                    price: store.price_at(ts),
                    metrics: store.metrics_with(ts, window),
                }
            })
            .collect();

        debug!(
            ticks = points.len(),
            with_metrics = points.iter().filter(|p| p.metrics.is_some()).count(),
            "Feature grid built"
        );

        Self {
            start,
            end,
            window,
            points,
        }
    }

    /// 격자 시작 시각 (첫 1분 캔들).
    pub fn start(&self) -> i64 {
        self.start
    }

    /// 격자 끝 시각 (마지막 1분 캔들).
    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn window(&self) -> MetricsWindow {
        self.window
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 격자 위 시각의 값. 격자에서 벗어난 시각은 `None`.
    pub fn at(&self, timestamp: i64) -> Option<&TickFeatures> {
        let offset = timestamp - self.start;
        if offset < 0 || offset % MS_PER_MINUTE != 0 {
            return None;
        }
        self.points.get((offset / MS_PER_MINUTE) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cycle_core::Candle;

    #[test]
    fn test_grid_matches_store() {
        let coarse: Vec<Candle> = (0..30)
            .map(|i| Candle::flat(i * MS_PER_MINUTE, 100.0 + i as f64))
            .collect();
        let fine: Vec<Candle> = (0..30 * 60)
            .map(|i| Candle::flat(i * 1_000, 100.0 + i as f64 / 60.0))
            .collect();
        let store = CandleStore::new(fine, coarse);
        let window = MetricsWindow {
            steps: 2,
            delta_multiplier: 1,
            ltma_multiplier: 5,
        };

        let grid = FeatureGrid::build(&store, window);
        assert_eq!(grid.len(), 30);
        assert_eq!(grid.end(), 29 * MS_PER_MINUTE);

        for minute in [0i64, 9, 10, 29] {
            let ts = minute * MS_PER_MINUTE;
            let point = grid.at(ts).unwrap();
            assert_eq!(point.price, store.price_at(ts));
            assert_eq!(point.metrics, store.metrics_with(ts, window));
        }
        assert!(grid.at(9 * MS_PER_MINUTE).unwrap().metrics.is_none());
        assert!(grid.at(10 * MS_PER_MINUTE).unwrap().metrics.is_some());
    }

    #[test]
    fn test_off_grid_lookup() {
        let store = CandleStore::new(
            vec![Candle::flat(0, 1.0)],
            vec![Candle::flat(0, 1.0), Candle::flat(MS_PER_MINUTE, 1.0)],
        );
        let grid = FeatureGrid::build(&store, MetricsWindow::default());
        assert!(grid.at(30_000).is_none());
        assert!(grid.at(-MS_PER_MINUTE).is_none());
        assert!(grid.at(2 * MS_PER_MINUTE).is_none());
        assert!(grid.at(MS_PER_MINUTE).is_some());
    }

    #[test]
    fn test_empty_store() {
        let grid = FeatureGrid::build(&CandleStore::default(), MetricsWindow::default());
        assert!(grid.is_empty());
        assert!(grid.at(0).is_none());
    }
}
