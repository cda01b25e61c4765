//! 콘솔 표와 파일 출력.

use anyhow::Result;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::Path;

use cycle_backtest::{SensitivityTable, SweepEntry};
use cycle_core::{format_ts, ParameterSet, StatsSummary, TakeProfitPolicy, Trade};

const WIDE_RULE: usize = 110;

/// 표시용 반올림. 유한하지 않은 값은 0으로 표시합니다.
pub fn round(value: f64, dp: u32) -> Decimal {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(dp))
        .unwrap_or_default()
}

/// 증거금 대비 수익률 (%). 증거금 가치가 없으면 0.
pub fn roi_pct(pnl: f64, margin_value: f64) -> f64 {
    if margin_value > 0.0 {
        pnl / margin_value * 100.0
    } else {
        0.0
    }
}

fn tp_value(policy: &TakeProfitPolicy) -> String {
    match policy {
        TakeProfitPolicy::Midpoint => "mid".to_string(),
        TakeProfitPolicy::FixedPercent { percent } => format!("{}", percent),
        TakeProfitPolicy::FixedRiskReward { ratio } => format!("rr{}", ratio),
    }
}

/// 단일 실행 요약.
pub fn summary_text(params: &ParameterSet, summary: &StatsSummary, margin_value: f64) -> String {
    let c = &summary.counters;
    let r = &summary.by_reason;
    let mut out = String::new();

    out.push_str(&format!("{}\n", "═".repeat(60)));
    out.push_str(&format!("  {}\n", params.label()));
    out.push_str(&format!("{}\n", "═".repeat(60)));
    out.push_str(&format!(
        "  사이클      : {} (오라클 질의 {}, 거부 {}, 오류 {})\n",
        c.cycles_started, c.oracle_checks, c.oracle_rejected, c.oracle_errors
    ));
    out.push_str(&format!(
        "  거래        : {} (롱 {}, 숏 {})\n",
        summary.total_trades, summary.long_trades, summary.short_trades
    ));
    out.push_str(&format!(
        "  승/패       : {}/{} (승률 {}%)\n",
        summary.wins,
        summary.losses,
        round(summary.win_rate, 2)
    ));
    out.push_str(&format!(
        "  순손익      : {} (총손익 {}, 수수료 {})\n",
        round(summary.total_pnl, 4),
        round(summary.total_gross_pnl, 4),
        round(summary.total_fees, 4)
    ));
    out.push_str(&format!(
        "  ROI         : {}%\n",
        round(roi_pct(summary.total_pnl, margin_value), 2)
    ));
    out.push_str(&format!(
        "  평균/최대   : {} / +{} / {}\n",
        round(summary.avg_pnl, 4),
        round(summary.max_win, 4),
        round(summary.max_loss, 4)
    ));
    out.push_str(&format!(
        "  청산 사유   : SL {} ({}), TP {} ({}), TO {} ({}), MH {} ({})\n",
        r.sl.count,
        round(r.sl.net_pnl, 4),
        r.tp.count,
        round(r.tp.net_pnl, 4),
        r.timeout.count,
        round(r.timeout.net_pnl, 4),
        r.max_hold.count,
        round(r.max_hold.net_pnl, 4)
    ));
    out
}

/// 순위 표. 실패한 조합은 오류 메시지로 표시됩니다.
pub fn ranked_table(title: &str, entries: &[SweepEntry], margin_value: f64) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n{}\n{}\n", "═".repeat(WIDE_RULE), title, "═".repeat(WIDE_RULE)));
    out.push_str(&format!(
        "{:<12}{:>8}{:>6}{:>8}{:>8}{:>14}{:>9}{:>12}{:>9}{:>5}{:>5}{:>5}{:>5}\n",
        "Entry L/S", "MinProb", "Lock", "TP", "Range", "Close", "Trades", "PnL", "ROI%", "SL", "TP",
        "TO", "MH"
    ));
    out.push_str(&format!("{}\n", "─".repeat(WIDE_RULE)));

    for entry in entries {
        let p = &entry.params;
        let head = format!(
            "{:<12}{:>8}{:>6}{:>8}{:>8}{:>14}",
            format!("{}/{}", p.entry_long, p.entry_short),
            format!("{}%", round(p.min_probability * 100.0, 0)),
            p.lock_before_end_secs,
            tp_value(&p.take_profit),
            format!("{}%", round(p.range * 100.0, 2)),
            p.close_strategy.as_str(),
        );

        match &entry.error {
            Some(error) => out.push_str(&format!("{}  실패: {}\n", head, error)),
            None => {
                let s = &entry.summary;
                let r = &s.by_reason;
                out.push_str(&format!(
                    "{}{:>9}{:>12}{:>9}{:>5}{:>5}{:>5}{:>5}\n",
                    head,
                    format!("{} ({}%)", s.total_trades, round(s.win_rate, 0)),
                    round(s.total_pnl, 4),
                    round(roi_pct(s.total_pnl, margin_value), 2),
                    r.sl.count,
                    r.tp.count,
                    r.timeout.count,
                    r.max_hold.count
                ));
            }
        }
    }
    out
}

/// 파라미터별 민감도 표.
pub fn sensitivity_text(tables: &[SensitivityTable]) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n파라미터 민감도\n{}\n", "═".repeat(80), "═".repeat(80)));
    for table in tables {
        if table.rows.len() < 2 {
            continue;
        }
        out.push_str(&format!("\n{}:\n", table.dimension));
        for row in &table.rows {
            out.push_str(&format!(
                "  {:<20} runs={:<5} avg PnL={:>12}  avg WR={:>6}%\n",
                row.value,
                row.runs,
                round(row.mean_net_pnl, 4),
                round(row.mean_win_rate, 2)
            ));
        }
    }
    out
}

fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// 순위가 매겨진 전체 조합의 CSV.
pub fn sweep_csv(entries: &[SweepEntry]) -> String {
    let mut output = String::new();
    output.push_str(
        "rank,range,cycle_time,entry_long,entry_short,min_probability,lock_before_end,\
         take_profit,close_strategy,trades,wins,win_rate,total_pnl,total_fees,sl,tp,timeout,max_hold,error\n",
    );

    for (i, entry) in entries.iter().enumerate() {
        let p = &entry.params;
        let s = &entry.summary;
        output.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
            i + 1,
            p.range,
            p.cycle_time_minutes,
            p.entry_long,
            p.entry_short,
            p.min_probability,
            p.lock_before_end_secs,
            escape_csv(&p.take_profit.to_string()),
            p.close_strategy.as_str(),
            s.total_trades,
            s.wins,
            round(s.win_rate, 2),
            round(s.total_pnl, 6),
            round(s.total_fees, 6),
            s.by_reason.sl.count,
            s.by_reason.tp.count,
            s.by_reason.timeout.count,
            s.by_reason.max_hold.count,
            escape_csv(entry.error.as_deref().unwrap_or(""))
        ));
    }

    output
}

/// 개별 거래 표.
pub fn trades_table(trades: &[Trade], limit: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>4}  {:<6}{:<21}{:>11}{:>11}{:>11}  {:<21}{:>11}{:>9}{:>8}{:>12}\n",
        "#", "Side", "Entry time", "Entry", "SL", "TP", "Close time", "Fill", "Reason", "Prob",
        "Net PnL"
    ));
    out.push_str(&format!("{}\n", "─".repeat(131)));

    let shown = if limit == 0 { trades.len() } else { limit.min(trades.len()) };
    for (i, t) in trades.iter().take(shown).enumerate() {
        out.push_str(&format!(
            "{:>4}  {:<6}{:<21}{:>11}{:>11}{:>11}  {:<21}{:>11}{:>9}{:>8}{:>12}\n",
            i + 1,
            t.side.to_string(),
            format_ts(t.entry_timestamp),
            round(t.entry_price, 2),
            round(t.stop_loss, 2),
            round(t.take_profit, 2),
            format_ts(t.close_timestamp),
            round(t.fill_price, 2),
            t.close_reason.as_str(),
            round(t.probability, 3),
            round(t.net_pnl, 4)
        ));
    }
    if shown < trades.len() {
        out.push_str(&format!("... {}건 생략\n", trades.len() - shown));
    }
    out
}

/// JSON 파일로 저장합니다. 상위 디렉터리를 만듭니다.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    save_text(path, &content)
}

/// 텍스트 파일로 저장합니다. 상위 디렉터리를 만듭니다.
pub fn save_text(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}
