//! 확률 캐시 생성.

use anyhow::{bail, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;

use cycle_core::SimulationSettings;
use cycle_oracle::{CacheBuilder, CachePeriod, LiveOracle, LiveOracleConfig};

use super::common::{default_cache_path, load_market, metrics_window};
use crate::report::round;

/// `cache` 인자.
#[derive(Debug, Clone, Args)]
pub struct CacheArgs {
    /// 레인지 반폭 (기본: 설정 값)
    #[arg(long)]
    pub range: Option<f64>,

    /// 출력 파일 (기본: rm-cache/cache_<range>pct_<from>_<to>.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 시작 후 건너뛸 분 수
    #[arg(long, default_value_t = 0)]
    pub warmup_minutes: u32,

    /// 동시 요청 수 (기본: 설정 값)
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// `cache` 명령.
pub async fn execute(settings: &SimulationSettings, args: CacheArgs) -> Result<()> {
    let range = args.range.unwrap_or(settings.range);
    if !range.is_finite() || range <= 0.0 {
        bail!("레인지는 양수여야 합니다: {}", range);
    }
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_cache_path(settings, range));

    let (store, _, _) = load_market(settings)?;
    let oracle = LiveOracle::new(LiveOracleConfig::from(&settings.oracle))?;

    let builder = CacheBuilder::new(range, metrics_window(settings))
        .with_warmup_minutes(args.warmup_minutes)
        .with_concurrency(args.concurrency.unwrap_or(settings.oracle.concurrency));

    let pb = ProgressBar::new(builder.queries(&store).len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    let progress = |done: usize, _total: usize| pb.set_position(done as u64);

    let period = CachePeriod {
        from: settings.from_date,
        to: settings.to_date,
    };
    let (document, summary) = builder.build(&store, &oracle, period, Some(&progress)).await;
    pb.finish_and_clear();

    document.save(&output)?;
    let stats = oracle.stats();
    info!(
        path = %output.display(),
        records = summary.records,
        errors = summary.errors,
        hit_rate = stats.hit_rate(),
        "Cache saved"
    );

    println!("\n캐시 저장: {}", output.display());
    println!("  레코드    : {}", summary.records);
    println!("  오류      : {}", summary.errors);
    println!(
        "  요청      : {} (실패 {}, 메모 적중률 {}%)",
        stats.requests,
        stats.errors,
        round(stats.hit_rate(), 1)
    );
    if let (Some(min), Some(mean), Some(max)) = (
        summary.min_probability,
        summary.mean_probability,
        summary.max_probability,
    ) {
        println!(
            "  확률      : min {} / mean {} / max {}",
            round(min, 4),
            round(mean, 4),
            round(max, 4)
        );
    }

    if !summary.histogram.is_empty() {
        println!("\n확률 분포:");
        let peak = summary.histogram.iter().map(|(_, _, n)| *n).max().unwrap_or(0).max(1);
        for (lo, hi, count) in &summary.histogram {
            let bar = "█".repeat(count * 40 / peak);
            println!("  {:.2}-{:.2} {:>7} {}", lo, hi, count, bar);
        }
    }

    Ok(())
}
