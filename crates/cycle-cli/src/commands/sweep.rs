//! 파라미터 매트릭스 스윕.

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{info, warn};

use cycle_backtest::{
    OracleRegistry, PnlModel, SensitivityTable, SweepEntry, SweepMatrix, SweepRunner,
};
use cycle_core::{hours_ms, ParameterSet, SimulationSettings};
use cycle_oracle::CachePeriod;

use super::common::{
    build_oracle, default_cache_path, load_market, load_replay, margin_value, OracleArgs,
    OracleKind,
};
use crate::report;

/// JSON 결과에 남기는 상위 조합 수.
const SAVED_RESULTS: usize = 100;

/// `sweep` 인자.
#[derive(Debug, Clone, Args)]
pub struct SweepArgs {
    /// 매트릭스 파일 (TOML 또는 JSON)
    #[arg(short, long)]
    pub matrix: PathBuf,

    #[command(flatten)]
    pub oracle: OracleArgs,

    /// 콘솔에 표시할 상위 조합 수
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// 콘솔에 표시할 하위 조합 수
    #[arg(long, default_value_t = 10)]
    pub bottom: usize,

    /// 결과 JSON 경로 (기본: results/sweep_<timestamp>.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 전체 순위 CSV 경로
    #[arg(long)]
    pub csv: Option<PathBuf>,
}

/// 스윕 결과 문서.
#[derive(Debug, Serialize)]
struct SweepDocument<'a> {
    timestamp: String,
    period: CachePeriod,
    matrix: &'a SweepMatrix,
    total_combinations: usize,
    failed: usize,
    execution_ms: u64,
    results: &'a [SweepEntry],
    sensitivity: &'a [SensitivityTable],
}

/// 조합들이 쓰는 레인지 목록 (중복 제거, 오름차순).
fn distinct_ranges(combos: &[ParameterSet]) -> Vec<f64> {
    let set: BTreeSet<u64> = combos.iter().map(|p| p.range.to_bits()).collect();
    let mut ranges: Vec<f64> = set.into_iter().map(f64::from_bits).collect();
    ranges.sort_by(|a, b| a.total_cmp(b));
    ranges
}

/// 오라클 종류에 맞춰 레인지별 레지스트리를 만듭니다.
fn build_registry(
    settings: &SimulationSettings,
    args: &OracleArgs,
    ranges: &[f64],
) -> Result<OracleRegistry> {
    if args.oracle != OracleKind::Replay {
        let oracle = build_oracle(settings, args, settings.range)?;
        return Ok(OracleRegistry::single(oracle));
    }

    let paths: Vec<PathBuf> = if args.cache.is_empty() {
        ranges
            .iter()
            .map(|range| default_cache_path(settings, *range))
            .collect()
    } else {
        args.cache.clone()
    };

    let replays = paths
        .iter()
        .map(|path| load_replay(path))
        .collect::<Result<Vec<_>>>()?;
    let registry = OracleRegistry::from_replays(replays);

    let missing: Vec<f64> = ranges
        .iter()
        .copied()
        .filter(|range| registry.for_range(*range).is_err())
        .collect();
    if !missing.is_empty() {
        bail!("레인지 {:?}에 해당하는 캐시가 없습니다", missing);
    }
    Ok(registry)
}

/// `sweep` 명령.
pub async fn execute(settings: &SimulationSettings, args: SweepArgs) -> Result<()> {
    let matrix = SweepMatrix::load(&args.matrix)?;
    let combos = matrix.expand(settings)?;
    info!(
        matrix = %args.matrix.display(),
        combinations = combos.len(),
        "Sweep matrix expanded"
    );

    let registry = build_registry(settings, &args.oracle, &distinct_ranges(&combos))?;
    let (store, grid, _) = load_market(settings)?;
    let margin = margin_value(settings, &store);
    let pnl = PnlModel::from_settings(settings);
    let max_hold_ms = hours_ms(settings.max_hold_hours);

    let pb = ProgressBar::new(combos.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let bar = pb.clone();
    let sweep = tokio::task::spawn_blocking(move || {
        let progress = move |done: usize, _total: usize| bar.set_position(done as u64);
        SweepRunner::new(&store, &grid, &registry, pnl)
            .with_max_hold_ms(max_hold_ms)
            .run(&combos, Some(&progress))
    })
    .await?;
    pb.finish_and_clear();

    if sweep.failed > 0 {
        warn!(failed = sweep.failed, total = sweep.total, "Some combinations failed");
    }
    println!(
        "\n완료: {}개 조합, {}ms (실패 {})",
        sweep.total, sweep.elapsed_ms, sweep.failed
    );

    let sensitivity = sweep.sensitivity();
    print!(
        "{}",
        report::ranked_table(
            &format!("상위 {} 조합", args.top),
            sweep.top(args.top),
            margin
        )
    );
    if args.bottom > 0 && sweep.ranked().len() > args.top {
        let mut worst = sweep.bottom(args.bottom).to_vec();
        worst.reverse();
        print!(
            "{}",
            report::ranked_table(&format!("하위 {} 조합", args.bottom), &worst, margin)
        );
    }
    if !sweep.failures().is_empty() {
        print!(
            "{}",
            report::ranked_table("실패한 조합", sweep.failures(), margin)
        );
    }
    print!("{}", report::sensitivity_text(&sensitivity));

    let now = Utc::now();
    let output = args.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!("results/sweep_{}.json", now.format("%Y%m%d_%H%M%S")))
    });
    let document = SweepDocument {
        timestamp: now.to_rfc3339(),
        period: CachePeriod {
            from: settings.from_date,
            to: settings.to_date,
        },
        matrix: &matrix,
        total_combinations: sweep.total,
        failed: sweep.failed,
        execution_ms: sweep.elapsed_ms,
        results: sweep.top(SAVED_RESULTS),
        sensitivity: &sensitivity,
    };
    report::save_json(&output, &document)?;
    println!("\n결과 저장: {}", output.display());

    if let Some(path) = &args.csv {
        report::save_text(path, &report::sweep_csv(&sweep.entries))?;
        println!("CSV 저장: {}", path.display());
    }

    Ok(())
}
