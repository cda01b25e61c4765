//! 일자별 JSON 캔들 파일 로더.
//!
//! 디렉터리 구조:
//! ```text
//! <data_path>/2025-05-01.json      # 1초 캔들
//! <data_path>/1m/2025-05-01.json   # 1분 캔들
//! ```
//! 각 파일은 `{timestamp, close, high, low}` 객체의 배열입니다.
//! 없는 날짜는 건너뛰고 개수만 집계합니다.

use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use cycle_core::{date_range, Candle, RawCandle};

use crate::error::{DataError, DataResult};
use crate::store::{normalize, CandleStore};

/// 캔들 해상도.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// 1초 캔들 (가격 조회, 도달 탐색)
    Second,
    /// 1분 캔들 (지표 계산, 틱 격자)
    Minute,
}

impl Resolution {
    /// 데이터 경로 아래 하위 디렉터리.
    pub fn subdir(&self) -> Option<&'static str> {
        match self {
            Resolution::Second => None,
            Resolution::Minute => Some("1m"),
        }
    }
}

/// 한 해상도의 로드 결과.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeriesReport {
    pub files_loaded: usize,
    pub files_missing: usize,
    pub files_failed: usize,
    /// 최종 레코드 수
    pub records: usize,
    /// timestamp 누락 등으로 버린 레코드 수
    pub discarded: usize,
    /// 중복 시각으로 제거된 레코드 수
    pub duplicates: usize,
}

/// 전체 로드 결과.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub days_requested: usize,
    pub fine: SeriesReport,
    pub coarse: SeriesReport,
}

/// 일자별 캔들 파일 로더.
#[derive(Debug, Clone)]
pub struct CandleLoader {
    base_path: PathBuf,
}

impl CandleLoader {
    /// 새 로더를 생성합니다.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// 날짜와 해상도에 해당하는 파일 경로.
    pub fn path_for(&self, date: NaiveDate, resolution: Resolution) -> PathBuf {
        let file = format!("{}.json", date.format("%Y-%m-%d"));
        match resolution.subdir() {
            Some(dir) => self.base_path.join(dir).join(file),
            None => self.base_path.join(file),
        }
    }

    /// 기간의 두 해상도를 모두 로드해 저장소를 만듭니다.
    ///
    /// 어느 한 쪽 시계열이라도 비어 있으면 시뮬레이션을 할 수 없으므로
    /// [`DataError::EmptySeries`]를 반환합니다.
    pub fn load(&self, from: NaiveDate, to: NaiveDate) -> DataResult<(CandleStore, LoadReport)> {
        if from > to {
            return Err(DataError::InvalidData(format!(
                "시작일 {from}이 종료일 {to}보다 늦습니다"
            )));
        }
        let dates = date_range(from, to);
        info!(from = %from, to = %to, days = dates.len(), path = %self.base_path.display(), "Loading candles");

        let (fine, fine_report) = self.load_series(&dates, Resolution::Second);
        let (coarse, coarse_report) = self.load_series(&dates, Resolution::Minute);

        if fine.is_empty() {
            return Err(DataError::EmptySeries(format!(
                "1초 캔들 없음 ({})",
                self.base_path.display()
            )));
        }
        if coarse.is_empty() {
            return Err(DataError::EmptySeries(format!(
                "1분 캔들 없음 ({})",
                self.base_path.join("1m").display()
            )));
        }

        info!(
            fine = fine.len(),
            coarse = coarse.len(),
            "Candles loaded"
        );

        let report = LoadReport {
            days_requested: dates.len(),
            fine: fine_report,
            coarse: coarse_report,
        };
        Ok((CandleStore::new(fine, coarse), report))
    }

    /// 한 해상도의 파일들을 읽어 정렬/중복 제거된 캔들을 반환합니다.
    pub fn load_series(
        &self,
        dates: &[NaiveDate],
        resolution: Resolution,
    ) -> (Vec<Candle>, SeriesReport) {
        let mut report = SeriesReport::default();
        let mut candles = Vec::new();

        for date in dates {
            let path = self.path_for(*date, resolution);
            if !path.exists() {
                report.files_missing += 1;
                continue;
            }
            match read_candle_file(&path) {
                Ok(raw) => {
                    let total = raw.len();
                    let before = candles.len();
                    candles.extend(raw.into_iter().filter_map(RawCandle::into_candle));
                    report.discarded += total - (candles.len() - before);
                    report.files_loaded += 1;
                    debug!(path = %path.display(), records = total, "Candle file loaded");
                }
                Err(e) => {
                    report.files_failed += 1;
                    warn!(error = %e, "Skipping unreadable candle file");
                }
            }
        }

        if report.files_missing > 0 {
            warn!(
                resolution = ?resolution,
                missing = report.files_missing,
                "Candle days missing"
            );
        }

        let (candles, duplicates) = normalize(candles);
        report.duplicates = duplicates;
        report.records = candles.len();
        (candles, report)
    }
}

fn read_candle_file(path: &Path) -> DataResult<Vec<RawCandle>> {
    let content = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|e| DataError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
