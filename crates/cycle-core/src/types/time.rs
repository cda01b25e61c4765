//! 밀리초 타임스탬프 유틸리티.
//!
//! 시뮬레이션 코어의 모든 시각은 epoch 기준 정수 밀리초(`i64`)입니다.
//! 날짜 변환은 데이터 로드와 출력 경계에서만 수행합니다.

use chrono::{DateTime, NaiveDate};

/// 1초 (밀리초)
pub const MS_PER_SECOND: i64 = 1_000;
/// 1분 (밀리초)
pub const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
/// 1시간 (밀리초)
pub const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;

/// 분 → 밀리초.
pub fn minutes_ms(minutes: u32) -> i64 {
    i64::from(minutes) * MS_PER_MINUTE
}

/// 초 → 밀리초.
pub fn seconds_ms(seconds: u32) -> i64 {
    i64::from(seconds) * MS_PER_SECOND
}

/// 시간 → 밀리초.
pub fn hours_ms(hours: u32) -> i64 {
    i64::from(hours) * MS_PER_HOUR
}

/// 타임스탬프를 `YYYY-MM-DD HH:MM:SS` (UTC) 형식으로 표시합니다.
///
/// 범위를 벗어난 값은 숫자 그대로 표시합니다.
pub fn format_ts(ts: i64) -> String {
    DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// 시작일부터 종료일까지(포함) 날짜 목록.
pub fn date_range(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    from.iter_days().take_while(|d| *d <= to).collect()
}
