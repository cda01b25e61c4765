//! 단일 파라미터 세트 시뮬레이션.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

use cycle_backtest::{CycleEngine, PnlModel, RunOutcome};
use cycle_core::{hours_ms, SimulationSettings};

use super::common::{build_oracle, load_market, margin_value, OracleArgs, ParamArgs};
use crate::report;

/// `simulate` 인자.
#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub params: ParamArgs,

    #[command(flatten)]
    pub oracle: OracleArgs,

    /// 결과 JSON 저장 경로 (거래 목록 포함)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// 엔진을 한 번 실행하고 결과를 돌려줍니다.
///
/// 엔진은 동기 코드이므로 블로킹 스레드에서 실행합니다.
pub async fn run_simulation(
    settings: &SimulationSettings,
    params: &ParamArgs,
    oracle_args: &OracleArgs,
) -> Result<(RunOutcome, f64)> {
    let params = params.to_parameter_set(settings)?;
    let oracle = build_oracle(settings, oracle_args, params.range)?;
    let (store, grid, _) = load_market(settings)?;
    let margin = margin_value(settings, &store);
    let pnl = PnlModel::from_settings(settings);
    let max_hold_ms = hours_ms(settings.max_hold_hours);

    let outcome = tokio::task::spawn_blocking(move || {
        CycleEngine::new(&store, &grid, oracle.as_ref(), pnl)
            .with_max_hold_ms(max_hold_ms)
            .run(&params)
    })
    .await??;

    Ok((outcome, margin))
}

/// `simulate` 명령.
pub async fn execute(settings: &SimulationSettings, args: SimulateArgs) -> Result<()> {
    let (outcome, margin) = run_simulation(settings, &args.params, &args.oracle).await?;
    let summary = &outcome.summary;

    info!(
        params = %outcome.params.label(),
        cycles = summary.counters.cycles_started,
        trades = summary.total_trades,
        win_rate = summary.win_rate,
        pnl = summary.total_pnl,
        "Simulation completed"
    );

    println!("{}", report::summary_text(&outcome.params, summary, margin));

    if let Some(path) = &args.output {
        report::save_json(path, &outcome)?;
        println!("결과 저장: {}", path.display());
    }

    Ok(())
}
