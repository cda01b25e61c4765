//! 설정 관리.
//!
//! 시뮬레이션 전역 설정을 정의하고 로드합니다. 로드 순서는
//! 내장 기본값 → 설정 파일(TOML/JSON) → `CYCLE__` 접두사 환경 변수입니다.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::TakeProfitPolicy;
use crate::error::{CoreError, CoreResult};

/// 시뮬레이션 전역 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// 캔들 데이터 디렉터리 (1초 파일은 루트, 1분 파일은 `1m/`)
    pub data_path: PathBuf,
    /// 시작일 (포함)
    pub from_date: NaiveDate,
    /// 종료일 (포함)
    pub to_date: NaiveDate,
    /// 레인지 반폭 (비율, 0.005 = 0.5%)
    pub range: f64,
    /// 사이클 길이 (분)
    pub cycle_time_minutes: u32,
    /// 증거금 (기초 자산 단위)
    pub margin: f64,
    /// 레버리지
    pub leverage: f64,
    /// 수수료율
    pub fees: FeeSettings,
    /// 리스크 모듈 스텝 수
    pub risk_module_steps: u32,
    /// delta 윈도우 배수
    pub delta_multiplier: u32,
    /// LTMA 윈도우 배수
    pub ltma_multiplier: u32,
    /// 익절 정책
    pub take_profit: TakeProfitPolicy,
    /// no_cycle 전략의 최대 보유 시간 (시간)
    pub max_hold_hours: u32,
    /// 확률 오라클 설정
    pub oracle: OracleSettings,
    /// 로깅 설정
    pub logging: LoggingSettings,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/ETHUSDT"),
            from_date: default_from_date(),
            to_date: default_to_date(),
            range: 0.005,
            cycle_time_minutes: 10,
            margin: 0.5,
            leverage: 3.0,
            fees: FeeSettings::default(),
            risk_module_steps: 10,
            delta_multiplier: 2,
            ltma_multiplier: 15,
            take_profit: TakeProfitPolicy::FixedPercent { percent: 0.35 },
            max_hold_hours: 24,
            oracle: OracleSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

fn default_from_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, 1).unwrap_or_default()
}

fn default_to_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 25).unwrap_or_default()
}

/// 거래소 수수료율.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct FeeSettings {
    /// 메이커 수수료율
    #[serde(default = "default_maker_fee")]
    pub maker: f64,
    /// 테이커 수수료율 (진입/청산 모두에 적용)
    #[serde(default = "default_taker_fee")]
    pub taker: f64,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            maker: default_maker_fee(),
            taker: default_taker_fee(),
        }
    }
}

fn default_maker_fee() -> f64 {
    0.00018
}
fn default_taker_fee() -> f64 {
    0.00045
}

/// 라이브 확률 오라클 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleSettings {
    /// 오라클 엔드포인트 URL
    #[serde(default = "default_oracle_url")]
    pub url: String,
    /// 최대 재시도 횟수 (총 시도 = max_retries + 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 요청당 타임아웃 (밀리초)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// 재시도 백오프 단위 (밀리초, 시도 횟수에 비례)
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// 동시 요청 수
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            url: default_oracle_url(),
            max_retries: default_max_retries(),
            timeout_ms: default_timeout_ms(),
            backoff_ms: default_backoff_ms(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_oracle_url() -> String {
    "http://localhost:8000/api/v1/probability".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_ms() -> u64 {
    5000
}
fn default_backoff_ms() -> u64 {
    500
}
fn default_concurrency() -> usize {
    100
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// 로그 레벨
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 출력 형식 (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl SimulationSettings {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일에 없는 항목은 기본값을 사용하며, `CYCLE__RANGE=0.007`처럼
    /// 환경 변수로 덮어쓸 수 있습니다.
    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("CYCLE")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// 설정 파일 없이 기본값과 환경 변수만으로 로드합니다.
    pub fn from_env() -> CoreResult<Self> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("CYCLE")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// 설정 값의 유효성을 검사합니다.
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.range > 0.0 && self.range < 1.0) {
            return Err(CoreError::Config(format!(
                "range는 (0, 1) 구간이어야 합니다: {}",
                self.range
            )));
        }
        if self.cycle_time_minutes == 0 {
            return Err(CoreError::Config(
                "cycle_time_minutes는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.margin <= 0.0 || self.leverage <= 0.0 {
            return Err(CoreError::Config(format!(
                "margin/leverage는 양수여야 합니다: margin={}, leverage={}",
                self.margin, self.leverage
            )));
        }
        if self.fees.maker < 0.0 || self.fees.taker < 0.0 {
            return Err(CoreError::Config("수수료율은 음수일 수 없습니다".to_string()));
        }
        if self.risk_module_steps == 0 || self.ltma_multiplier == 0 || self.delta_multiplier == 0
        {
            return Err(CoreError::Config(
                "risk_module_steps와 윈도우 배수는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.from_date > self.to_date {
            return Err(CoreError::Config(format!(
                "from_date({})가 to_date({})보다 늦습니다",
                self.from_date, self.to_date
            )));
        }
        self.take_profit.validate()?;
        Ok(())
    }

    /// 포지션 크기 (증거금 × 레버리지).
    pub fn position_size(&self) -> f64 {
        self.margin * self.leverage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = SimulationSettings::default();
        assert_eq!(settings.range, 0.005);
        assert_eq!(settings.cycle_time_minutes, 10);
        assert_eq!(settings.fees.taker, 0.00045);
        assert_eq!(settings.oracle.max_retries, 3);
        assert!((settings.position_size() - 1.5).abs() < 1e-12);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
data_path = "/tmp/eth"
from_date = "2025-06-01"
to_date = "2025-06-03"
range = 0.007
cycle_time_minutes = 15

[take_profit]
type = "fixed_rr"
ratio = 2.0

[fees]
taker = 0.0005
"#
        )
        .unwrap();

        let settings = SimulationSettings::load(file.path()).unwrap();
        assert_eq!(settings.range, 0.007);
        assert_eq!(settings.cycle_time_minutes, 15);
        assert_eq!(settings.fees.taker, 0.0005);
        assert_eq!(settings.fees.maker, 0.00018);
        assert_eq!(settings.ltma_multiplier, 15);
        assert_eq!(
            settings.take_profit,
            TakeProfitPolicy::FixedRiskReward { ratio: 2.0 }
        );
    }

    #[test]
    fn test_validate_rejects_inverted_dates() {
        let settings = SimulationSettings {
            from_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_range() {
        let settings = SimulationSettings {
            range: 0.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
