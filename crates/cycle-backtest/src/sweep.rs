//! 파라미터 매트릭스 스윕.
//!
//! 매트릭스의 데카르트 곱으로 파라미터 세트를 만들고, 각 세트를 rayon으로
//! 병렬 실행합니다. 모든 실행은 같은 `CandleStore`/`FeatureGrid`를 읽기
//! 전용으로 공유하며, 한 조합의 실패(에러 또는 패닉)는 기록만 하고 나머지
//! 조합은 계속 실행합니다.
//!
//! 결과는 순손익 내림차순으로 정렬되며 실패한 조합은 맨 뒤에 놓입니다.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use cycle_core::{
    CloseStrategyKind, ParameterSet, SimulationSettings, StatsSummary, TakeProfitPolicy,
};
use cycle_data::{CandleStore, FeatureGrid};
use cycle_oracle::{ProbabilityOracle, ReplayOracle};

use crate::close::CloseStrategy;
use crate::engine::CycleEngine;
use crate::error::{BacktestError, BacktestResult};
use crate::pnl::PnlModel;

// ---------------------------------------------------------------------------
// Matrix
// ---------------------------------------------------------------------------

/// 스윕 매트릭스.
///
/// 진입 임계값은 `(long, short)` 쌍으로만 조합되고 나머지 차원은 독립적으로
/// 곱해집니다. 선택 차원이 비어 있으면 전역 설정 값 하나를 사용합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepMatrix {
    #[serde(alias = "entryPairs")]
    pub entry_pairs: Vec<(f64, f64)>,
    #[serde(alias = "minProbability")]
    pub min_probability: Vec<f64>,
    /// 초 단위
    #[serde(alias = "lockBeforeEnd")]
    pub lock_before_end: Vec<u32>,
    /// 익절 퍼센트 (`fixed_percent`)
    #[serde(alias = "tpPercent")]
    pub tp_percent: Vec<f64>,
    #[serde(default)]
    pub ranges: Vec<f64>,
    /// 분 단위
    #[serde(default, alias = "cycleTimes")]
    pub cycle_times: Vec<u32>,
    #[serde(default, alias = "closeStrategies")]
    pub close_strategies: Vec<String>,
}

impl SweepMatrix {
    /// TOML 또는 JSON 파일에서 매트릭스를 읽습니다 (확장자로 구분).
    pub fn load(path: &Path) -> BacktestResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BacktestError::Config(format!("스윕 매트릭스 읽기 실패 {}: {e}", path.display()))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(&raw).map_err(|e| {
                BacktestError::Config(format!("스윕 매트릭스 파싱 실패 {}: {e}", path.display()))
            })
        } else {
            toml::from_str(&raw).map_err(|e| {
                BacktestError::Config(format!("스윕 매트릭스 파싱 실패 {}: {e}", path.display()))
            })
        }
    }

    /// 조합 개수.
    pub fn combination_count(&self) -> usize {
        self.entry_pairs.len()
            * self.min_probability.len()
            * self.lock_before_end.len()
            * self.tp_percent.len()
            * self.ranges.len().max(1)
            * self.cycle_times.len().max(1)
            * self.close_strategies.len().max(1)
    }

    /// 매트릭스를 파라미터 세트 목록으로 펼칩니다.
    ///
    /// 알 수 없는 청산 전략이나 빈 필수 차원은 시뮬레이션 전에 에러로
    /// 반환합니다. 개별 조합의 값 검증은 실행 시점에 조합별로 이루어집니다.
    pub fn expand(&self, settings: &SimulationSettings) -> BacktestResult<Vec<ParameterSet>> {
        for (name, len) in [
            ("entry_pairs", self.entry_pairs.len()),
            ("min_probability", self.min_probability.len()),
            ("lock_before_end", self.lock_before_end.len()),
            ("tp_percent", self.tp_percent.len()),
        ] {
            if len == 0 {
                return Err(BacktestError::Config(format!("{name} 목록이 비어 있습니다")));
            }
        }

        let strategies: Vec<CloseStrategyKind> = if self.close_strategies.is_empty() {
            vec![CloseStrategyKind::CycleTimeout]
        } else {
            self.close_strategies
                .iter()
                .map(|name| name.parse::<CloseStrategyKind>())
                .collect::<Result<Vec<_>, _>>()?
        };
        let ranges = or_default(&self.ranges, settings.range);
        let cycle_times = or_default(&self.cycle_times, settings.cycle_time_minutes);

        let mut combos = Vec::with_capacity(self.combination_count());
        for &(entry_long, entry_short) in &self.entry_pairs {
            for &min_probability in &self.min_probability {
                for &lock_before_end_secs in &self.lock_before_end {
                    for &percent in &self.tp_percent {
                        for &range in &ranges {
                            for &cycle_time_minutes in &cycle_times {
                                for &close_strategy in &strategies {
                                    combos.push(ParameterSet {
                                        range,
                                        cycle_time_minutes,
                                        entry_long,
                                        entry_short,
                                        min_probability,
                                        lock_before_end_secs,
                                        take_profit: TakeProfitPolicy::FixedPercent { percent },
                                        close_strategy,
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(combos)
    }
}

fn or_default<T: Copy>(values: &[T], fallback: T) -> Vec<T> {
    if values.is_empty() {
        vec![fallback]
    } else {
        values.to_vec()
    }
}

// ---------------------------------------------------------------------------
// Oracle registry
// ---------------------------------------------------------------------------

/// 레인지별 확률 오라클.
///
/// 캐시 문서는 레인지마다 따로 만들어지므로 스윕은 조합의 레인지로 오라클을
/// 고릅니다. 등록되지 않은 레인지는 fallback을 사용합니다.
#[derive(Clone, Default)]
pub struct OracleRegistry {
    by_range: Vec<(f64, Arc<dyn ProbabilityOracle>)>,
    fallback: Option<Arc<dyn ProbabilityOracle>>,
}

impl OracleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 모든 레인지에 같은 오라클을 사용합니다.
    pub fn single(oracle: Arc<dyn ProbabilityOracle>) -> Self {
        Self::new().with_fallback(oracle)
    }

    /// 재생 오라클들을 각자의 레인지로 등록합니다.
    pub fn from_replays(replays: impl IntoIterator<Item = ReplayOracle>) -> Self {
        let mut registry = Self::new();
        for replay in replays {
            let range = replay.range();
            registry.insert(range, Arc::new(replay));
        }
        registry
    }

    pub fn with_fallback(mut self, oracle: Arc<dyn ProbabilityOracle>) -> Self {
        self.fallback = Some(oracle);
        self
    }

    /// 레인지에 오라클을 등록합니다. 같은 레인지는 덮어씁니다.
    pub fn insert(&mut self, range: f64, oracle: Arc<dyn ProbabilityOracle>) {
        match self.by_range.iter_mut().find(|(r, _)| same_range(*r, range)) {
            Some(slot) => slot.1 = oracle,
            None => self.by_range.push((range, oracle)),
        }
    }

    /// 레인지에 해당하는 오라클.
    pub fn for_range(&self, range: f64) -> BacktestResult<&dyn ProbabilityOracle> {
        self.by_range
            .iter()
            .find(|(r, _)| same_range(*r, range))
            .map(|(_, oracle)| oracle.as_ref())
            .or(self.fallback.as_deref())
            .ok_or(BacktestError::MissingOracle { range })
    }

    /// 등록된 레인지 목록.
    pub fn ranges(&self) -> Vec<f64> {
        self.by_range.iter().map(|(r, _)| *r).collect()
    }
}

fn same_range(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-12
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// 스윕 결과 한 건.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub params: ParameterSet,
    /// 실패한 조합은 빈 요약
    pub summary: StatsSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SweepEntry {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// 병렬 스윕 실행기.
pub struct SweepRunner<'a> {
    store: &'a CandleStore,
    grid: &'a FeatureGrid,
    oracles: &'a OracleRegistry,
    pnl: PnlModel,
    max_hold_ms: i64,
}

impl<'a> SweepRunner<'a> {
    pub fn new(
        store: &'a CandleStore,
        grid: &'a FeatureGrid,
        oracles: &'a OracleRegistry,
        pnl: PnlModel,
    ) -> Self {
        Self {
            store,
            grid,
            oracles,
            pnl,
            max_hold_ms: CloseStrategy::DEFAULT_MAX_HOLD_MS,
        }
    }

    pub fn with_max_hold_ms(mut self, max_hold_ms: i64) -> Self {
        self.max_hold_ms = max_hold_ms;
        self
    }

    /// 모든 조합을 병렬로 실행합니다.
    ///
    /// 입력 K개에 대해 항상 K개의 항목을 돌려줍니다. `progress`는 조합이
    /// 끝날 때마다 `(완료 수, 전체 수)`로 호출됩니다.
    pub fn run(
        &self,
        combos: &[ParameterSet],
        progress: Option<&(dyn Fn(usize, usize) + Sync)>,
    ) -> SweepReport {
        let total = combos.len();
        let started = Instant::now();
        let done = AtomicUsize::new(0);
        info!(combinations = total, ticks = self.grid.len(), "Sweep started");

        let mut entries: Vec<SweepEntry> = combos
            .par_iter()
            .map(|params| {
                let result = catch_unwind(AssertUnwindSafe(|| self.run_one(params)))
                    .unwrap_or_else(|payload| {
                        Err(BacktestError::Aborted(panic_message(payload.as_ref())))
                    });

                let entry = match result {
                    Ok(summary) => SweepEntry {
                        params: *params,
                        summary,
                        error: None,
                    },
                    Err(e) => {
                        warn!(params = %params.label(), error = %e, "Sweep combination failed");
                        SweepEntry {
                            params: *params,
                            summary: StatsSummary::default(),
                            error: Some(e.to_string()),
                        }
                    }
                };

                let finished = done.fetch_add(1, AtomicOrdering::Relaxed) + 1;
                if let Some(progress) = progress {
                    progress(finished, total);
                }
                entry
            })
            .collect();

        rank(&mut entries);
        let failed = entries.iter().filter(|e| e.is_failed()).count();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(combinations = total, failed, elapsed_ms, "Sweep finished");

        SweepReport {
            total,
            failed,
            elapsed_ms,
            entries,
        }
    }

    fn run_one(&self, params: &ParameterSet) -> BacktestResult<StatsSummary> {
        let oracle = self.oracles.for_range(params.range)?;
        let outcome = CycleEngine::new(self.store, self.grid, oracle, self.pnl.clone())
            .with_max_hold_ms(self.max_hold_ms)
            .run(params)?;
        Ok(outcome.summary)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

/// 순손익 내림차순, 실패는 맨 뒤.
fn rank(entries: &mut [SweepEntry]) {
    entries.sort_by(|a, b| match (a.is_failed(), b.is_failed()) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        _ => b
            .summary
            .total_pnl
            .partial_cmp(&a.summary.total_pnl)
            .unwrap_or(Ordering::Equal),
    });
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// 스윕 보고서.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub total: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
    /// 순위 순 항목 (실패는 맨 뒤)
    pub entries: Vec<SweepEntry>,
}

/// 민감도 표의 한 행.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRow {
    pub value: String,
    pub runs: usize,
    pub mean_net_pnl: f64,
    pub mean_win_rate: f64,
}

/// 한 차원의 값별 평균 성과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityTable {
    pub dimension: String,
    pub rows: Vec<SensitivityRow>,
}

/// 민감도 분석 차원.
const DIMENSIONS: [&str; 7] = [
    "entry_pair",
    "min_probability",
    "lock_before_end",
    "take_profit",
    "range",
    "cycle_time",
    "close_strategy",
];

fn dimension_value(dimension: &str, p: &ParameterSet) -> String {
    match dimension {
        "entry_pair" => format!("{}/{}", p.entry_long, p.entry_short),
        "min_probability" => p.min_probability.to_string(),
        "lock_before_end" => format!("{}s", p.lock_before_end_secs),
        "take_profit" => p.take_profit.to_string(),
        "range" => format!("{}%", p.range * 100.0),
        "cycle_time" => format!("{}m", p.cycle_time_minutes),
        _ => p.close_strategy.to_string(),
    }
}

impl SweepReport {
    /// 성공한 항목 (순위 순).
    pub fn ranked(&self) -> &[SweepEntry] {
        &self.entries[..self.entries.len() - self.failed]
    }

    /// 실패한 항목.
    pub fn failures(&self) -> &[SweepEntry] {
        &self.entries[self.entries.len() - self.failed..]
    }

    /// 상위 n개.
    pub fn top(&self, n: usize) -> &[SweepEntry] {
        let ranked = self.ranked();
        &ranked[..n.min(ranked.len())]
    }

    /// 하위 n개 (순위 순, 마지막이 최하위).
    pub fn bottom(&self, n: usize) -> &[SweepEntry] {
        let ranked = self.ranked();
        &ranked[ranked.len().saturating_sub(n)..]
    }

    /// 차원별, 값별 평균 순손익과 평균 승률.
    ///
    /// 행은 평균 순손익 내림차순입니다. 실패한 조합은 제외합니다.
    pub fn sensitivity(&self) -> Vec<SensitivityTable> {
        DIMENSIONS
            .iter()
            .map(|dimension| {
                let mut groups: Vec<(String, usize, f64, f64)> = Vec::new();
                for entry in self.ranked() {
                    let value = dimension_value(dimension, &entry.params);
                    let slot = match groups.iter().position(|g| g.0 == value) {
                        Some(i) => &mut groups[i],
                        None => {
                            groups.push((value, 0, 0.0, 0.0));
                            let last = groups.len() - 1;
                            &mut groups[last]
                        }
                    };
                    slot.1 += 1;
                    slot.2 += entry.summary.total_pnl;
                    slot.3 += entry.summary.win_rate;
                }

                let mut rows: Vec<SensitivityRow> = groups
                    .into_iter()
                    .map(|(value, runs, pnl, win_rate)| SensitivityRow {
                        value,
                        runs,
                        mean_net_pnl: pnl / runs as f64,
                        mean_win_rate: win_rate / runs as f64,
                    })
                    .collect();
                rows.sort_by(|a, b| {
                    b.mean_net_pnl
                        .partial_cmp(&a.mean_net_pnl)
                        .unwrap_or(Ordering::Equal)
                });

                SensitivityTable {
                    dimension: dimension.to_string(),
                    rows,
                }
            })
            .collect()
    }
}
