//! 레인지 사이클 백테스터 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 캐시 재생으로 단일 시뮬레이션
//! cycle -c config/backtest.toml simulate --entry-long 0.3 --entry-short 0.7
//!
//! # 파라미터 매트릭스 스윕
//! cycle -c config/backtest.toml sweep --matrix config/matrix.toml --csv results/sweep.csv
//!
//! # 라이브 오라클로 확률 캐시 생성
//! cycle -c config/backtest.toml cache --range 0.01
//!
//! # 개별 거래 보기
//! cycle -c config/backtest.toml trades --limit 20
//! ```

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

use cycle_cli::commands::{cache, common, simulate, sweep, trades};
use cycle_core::{init_logging, LogConfig};

#[derive(Parser)]
#[command(name = "cycle")]
#[command(about = "Range-cycle backtester - 확률 오라클 기반 레인지 사이클 시뮬레이션", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일 (TOML 또는 JSON). 없으면 기본값과 CYCLE__* 환경 변수
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 단일 파라미터 세트 시뮬레이션
    Simulate(simulate::SimulateArgs),

    /// 파라미터 매트릭스 스윕
    Sweep(sweep::SweepArgs),

    /// 라이브 오라클로 확률 캐시 생성
    Cache(cache::CacheArgs),

    /// 개별 거래 출력
    Trades(trades::TradesArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = common::load_settings(cli.config.as_deref())?;

    init_logging(LogConfig::from_settings(&settings.logging))
        .map_err(|e| anyhow!("로깅 초기화 실패: {}", e))?;

    let result = match cli.command {
        Commands::Simulate(args) => simulate::execute(&settings, args).await,
        Commands::Sweep(args) => sweep::execute(&settings, args).await,
        Commands::Cache(args) => cache::execute(&settings, args).await,
        Commands::Trades(args) => trades::execute(&settings, args).await,
    };

    if let Err(e) = &result {
        error!("Command failed: {:#}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sweep() {
        let cli = Cli::try_parse_from([
            "cycle",
            "sweep",
            "--matrix",
            "matrix.toml",
            "--oracle",
            "fixed",
            "-c",
            "settings.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("settings.toml")));
        match cli.command {
            Commands::Sweep(args) => {
                assert_eq!(args.matrix, PathBuf::from("matrix.toml"));
                assert_eq!(args.oracle.oracle, common::OracleKind::Fixed);
                assert_eq!(args.top, 20);
            }
            _ => panic!("expected sweep"),
        }
    }
}
