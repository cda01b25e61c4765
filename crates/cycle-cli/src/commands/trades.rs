//! 개별 거래 출력.

use anyhow::Result;
use clap::Args;

use cycle_core::SimulationSettings;

use super::common::{OracleArgs, ParamArgs};
use super::simulate::run_simulation;
use crate::report;

/// `trades` 인자.
#[derive(Debug, Clone, Args)]
pub struct TradesArgs {
    #[command(flatten)]
    pub params: ParamArgs,

    #[command(flatten)]
    pub oracle: OracleArgs,

    /// 출력할 최대 거래 수 (0 = 전체)
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

/// `trades` 명령.
pub async fn execute(settings: &SimulationSettings, args: TradesArgs) -> Result<()> {
    let (outcome, margin) = run_simulation(settings, &args.params, &args.oracle).await?;

    println!("{}", report::trades_table(&outcome.trades, args.limit));
    println!("{}", report::summary_text(&outcome.params, &outcome.summary, margin));
    Ok(())
}
