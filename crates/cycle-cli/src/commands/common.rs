//! 명령 간 공용 인자와 로딩 헬퍼.

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use cycle_core::{CloseStrategyKind, ParameterSet, SimulationSettings, TakeProfitPolicy};
use cycle_data::{CandleLoader, CandleStore, FeatureGrid, LoadReport, MetricsWindow};
use cycle_oracle::{
    cache_file_name, FixedOracle, LiveOracle, LiveOracleConfig, ProbabilityOracle, ReplayOracle,
};

/// 기본 캐시 디렉터리.
pub const CACHE_DIR: &str = "rm-cache";

/// 설정 파일이 있으면 파일과 환경 변수, 없으면 기본값과 환경 변수로 로드합니다.
pub fn load_settings(path: Option<&Path>) -> Result<SimulationSettings> {
    match path {
        Some(path) => SimulationSettings::load(path)
            .with_context(|| format!("설정 파일 로드 실패: {}", path.display())),
        None => SimulationSettings::from_env().context("환경 변수 설정 로드 실패"),
    }
}

/// 설정의 지표 윈도우.
pub fn metrics_window(settings: &SimulationSettings) -> MetricsWindow {
    MetricsWindow {
        steps: settings.risk_module_steps,
        delta_multiplier: settings.delta_multiplier,
        ltma_multiplier: settings.ltma_multiplier,
    }
}

/// 캔들 데이터를 로드하고 틱 격자를 만듭니다.
pub fn load_market(settings: &SimulationSettings) -> Result<(CandleStore, FeatureGrid, LoadReport)> {
    let loader = CandleLoader::new(&settings.data_path);
    let (store, report) = loader
        .load(settings.from_date, settings.to_date)
        .with_context(|| format!("캔들 로드 실패: {}", settings.data_path.display()))?;

    info!(
        days = report.days_requested,
        fine = report.fine.records,
        coarse = report.coarse.records,
        missing_days = report.fine.files_missing,
        "Candles loaded"
    );

    let grid = FeatureGrid::build(&store, metrics_window(settings));
    Ok((store, grid, report))
}

/// 첫 1초 캔들 가격으로 환산한 증거금 가치 (ROI 분모).
pub fn margin_value(settings: &SimulationSettings, store: &CandleStore) -> f64 {
    store
        .fine()
        .first()
        .map(|candle| settings.margin * candle.close)
        .unwrap_or_default()
}

/// 기본 캐시 파일 경로.
pub fn default_cache_path(settings: &SimulationSettings, range: f64) -> PathBuf {
    Path::new(CACHE_DIR).join(cache_file_name(range, settings.from_date, settings.to_date))
}

/// 확률 오라클 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OracleKind {
    /// 캐시 파일 재생
    Replay,
    /// HTTP 서비스 호출
    Live,
    /// 고정 확률 (드라이런)
    Fixed,
}

/// 오라클 선택 인자.
#[derive(Debug, Clone, Args)]
pub struct OracleArgs {
    /// 확률 오라클
    #[arg(long, value_enum, default_value_t = OracleKind::Replay)]
    pub oracle: OracleKind,

    /// 캐시 파일 (replay). 여러 번 지정하면 레인지별로 등록
    #[arg(long)]
    pub cache: Vec<PathBuf>,

    /// 고정 오라클 확률
    #[arg(long, default_value_t = FixedOracle::DEFAULT_PROBABILITY)]
    pub probability: f64,
}

/// 재생 오라클을 로드합니다.
pub fn load_replay(path: &Path) -> Result<ReplayOracle> {
    let replay = ReplayOracle::load(path)
        .with_context(|| format!("확률 캐시 로드 실패: {}", path.display()))?;
    if replay.anomalies() > 0 {
        warn!(
            path = %path.display(),
            anomalies = replay.anomalies(),
            "Malformed cache records dropped"
        );
    }
    info!(path = %path.display(), records = replay.len(), range = replay.range(), "Cache loaded");
    Ok(replay)
}

/// 한 레인지에 쓸 오라클을 만듭니다.
///
/// 라이브 오라클은 현재 tokio 런타임 핸들을 잡아 두므로 엔진은
/// `spawn_blocking` 스레드에서 실행해야 합니다.
pub fn build_oracle(
    settings: &SimulationSettings,
    args: &OracleArgs,
    range: f64,
) -> Result<Arc<dyn ProbabilityOracle>> {
    let oracle: Arc<dyn ProbabilityOracle> = match args.oracle {
        OracleKind::Fixed => Arc::new(FixedOracle::new(args.probability)),
        OracleKind::Live => {
            let live = LiveOracle::new(LiveOracleConfig::from(&settings.oracle))?
                .with_runtime(tokio::runtime::Handle::current());
            Arc::new(live)
        }
        OracleKind::Replay => {
            let path = match args.cache.first() {
                Some(path) => path.clone(),
                None => default_cache_path(settings, range),
            };
            let replay = load_replay(&path)?;
            if !replay.matches_range(range) {
                bail!(
                    "캐시 레인지 {}가 요청 레인지 {}와 다릅니다: {}",
                    replay.range(),
                    range,
                    path.display()
                );
            }
            Arc::new(replay)
        }
    };
    Ok(oracle)
}

/// 단일 파라미터 세트 인자.
#[derive(Debug, Clone, Args)]
pub struct ParamArgs {
    /// 레인지 반폭 (기본: 설정 값)
    #[arg(long)]
    pub range: Option<f64>,

    /// 사이클 길이, 분 (기본: 설정 값)
    #[arg(long)]
    pub cycle_time: Option<u32>,

    /// 롱 진입 임계값
    #[arg(long, default_value_t = 0.3)]
    pub entry_long: f64,

    /// 숏 진입 임계값
    #[arg(long, default_value_t = 0.7)]
    pub entry_short: f64,

    /// 최소 확률
    #[arg(long, default_value_t = 0.75)]
    pub min_probability: f64,

    /// 사이클 종료 전 진입 금지, 초
    #[arg(long, default_value_t = 60)]
    pub lock_before_end: u32,

    /// 익절 정책 (midpoint, fixed_percent, fixed_rr)
    #[arg(long)]
    pub tp_policy: Option<String>,

    /// 익절 수치 (퍼센트 또는 손익비)
    #[arg(long)]
    pub tp_value: Option<f64>,

    /// 청산 전략 (cycle_timeout, no_sl, no_cycle)
    #[arg(long, default_value = "cycle_timeout")]
    pub close_strategy: String,
}

impl ParamArgs {
    /// 설정 기본값과 합쳐 파라미터 세트를 만듭니다.
    pub fn to_parameter_set(&self, settings: &SimulationSettings) -> Result<ParameterSet> {
        let close_strategy: CloseStrategyKind = self.close_strategy.parse()?;

        let take_profit = match (&self.tp_policy, self.tp_value) {
            (None, None) => settings.take_profit,
            (Some(name), value) => {
                TakeProfitPolicy::from_name(name, value.unwrap_or_else(|| default_tp_value(name)))?
            }
            (None, Some(value)) => TakeProfitPolicy::from_name(settings.take_profit.name(), value)?,
        };

        let params = ParameterSet {
            range: self.range.unwrap_or(settings.range),
            cycle_time_minutes: self.cycle_time.unwrap_or(settings.cycle_time_minutes),
            entry_long: self.entry_long,
            entry_short: self.entry_short,
            min_probability: self.min_probability,
            lock_before_end_secs: self.lock_before_end,
            take_profit,
            close_strategy,
        };
        params.validate()?;
        Ok(params)
    }
}

fn default_tp_value(policy: &str) -> f64 {
    match policy.trim() {
        "fixed_rr" => 2.0,
        _ => 0.35,
    }
}
