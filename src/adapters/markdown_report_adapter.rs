//! Markdown report writer.
//!
//! One human-readable summary per run: a metrics table and a month-by-year
//! return grid for backtests, a ranked table for monitoring.

use crate::domain::action::Recommendation;
use crate::domain::backtest::BacktestResult;
use crate::domain::error::DislocationError;
use crate::ports::report_port::ReportPort;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::info;

pub struct MarkdownReportAdapter;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

struct MonthlyReturnRow {
    year: i32,
    months: Vec<Option<f64>>,
}

/// Compounded net return per calendar month, in percent.
fn compute_monthly_returns(dates: &[NaiveDate], net_returns: &[f64]) -> Vec<MonthlyReturnRow> {
    if dates.len() < 2 {
        return Vec::new();
    }

    let mut growth: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for (date, r) in dates.iter().zip(net_returns).skip(1) {
        *growth.entry((date.year(), date.month())).or_insert(1.0) *= 1.0 + r;
    }

    let (Some(min_year), Some(max_year)) = (
        growth.keys().map(|k| k.0).min(),
        growth.keys().map(|k| k.0).max(),
    ) else {
        return Vec::new();
    };

    (min_year..=max_year)
        .map(|year| MonthlyReturnRow {
            year,
            months: (1..=12u32)
                .map(|month| growth.get(&(year, month)).map(|g| (g - 1.0) * 100.0))
                .collect(),
        })
        .collect()
}

fn render_backtest(result: &BacktestResult) -> String {
    let m = &result.metrics;
    let mut out = String::new();
    let (first, last) = match (result.dates.first(), result.dates.last()) {
        (Some(f), Some(l)) => (f.to_string(), l.to_string()),
        _ => ("-".to_string(), "-".to_string()),
    };

    let _ = writeln!(out, "# Backtest {first} to {last}\n");
    let _ = writeln!(out, "| Metric | Value |");
    let _ = writeln!(out, "|---|---|");
    let _ = writeln!(out, "| Total return | {:.2}% |", m.total_return * 100.0);
    let _ = writeln!(out, "| CAGR | {:.2}% |", m.cagr * 100.0);
    let _ = writeln!(out, "| Volatility | {:.2}% |", m.volatility * 100.0);
    let _ = writeln!(out, "| Sharpe | {:.2} |", m.sharpe_ratio);
    let _ = writeln!(out, "| Sortino | {:.2} |", m.sortino_ratio);
    let _ = writeln!(out, "| Max drawdown | {:.2}% |", m.max_drawdown * 100.0);
    let _ = writeln!(out, "| Max drawdown duration | {} periods |", m.max_drawdown_duration);
    let _ = writeln!(out, "| Calmar | {:.2} |", m.calmar_ratio);
    let _ = writeln!(out, "| Mean turnover | {:.4} |", m.mean_turnover);
    let _ = writeln!(out, "| Avg gross exposure | {:.4} |", m.avg_gross_exposure);

    let monthly = compute_monthly_returns(&result.dates, &result.net_returns);
    if !monthly.is_empty() {
        let _ = writeln!(out, "\n## Monthly returns (%)\n");
        let _ = writeln!(out, "| Year | {} |", MONTHS.join(" | "));
        let _ = writeln!(out, "|---|{}", "---|".repeat(12));
        for row in monthly {
            let cells: Vec<String> = row
                .months
                .iter()
                .map(|v| v.map(|v| format!("{v:.2}")).unwrap_or_default())
                .collect();
            let _ = writeln!(out, "| {} | {} |", row.year, cells.join(" | "));
        }
    }
    out
}

fn render_recommendations(as_of: NaiveDate, recommendations: &[Recommendation]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Dislocation monitor {as_of}\n");
    let _ = writeln!(out, "| Ticker | Action | Score | Rationale |");
    let _ = writeln!(out, "|---|---|---|---|");
    for r in recommendations {
        let score = r.score.map(|s| format!("{s:.2}")).unwrap_or_else(|| "n/a".into());
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            r.ticker,
            r.action,
            score,
            r.rationale.replace('|', "/")
        );
    }
    out
}

impl ReportPort for MarkdownReportAdapter {
    fn write_backtest(
        &self,
        result: &BacktestResult,
        out_dir: &Path,
    ) -> Result<(), DislocationError> {
        fs::create_dir_all(out_dir)?;
        let path = out_dir.join("backtest_report.md");
        fs::write(&path, render_backtest(result))?;
        info!(path = %path.display(), "backtest report written");
        Ok(())
    }

    fn write_recommendations(
        &self,
        as_of: NaiveDate,
        recommendations: &[Recommendation],
        out_dir: &Path,
    ) -> Result<(), DislocationError> {
        fs::create_dir_all(out_dir)?;
        let path = out_dir.join(format!("recommendations_{as_of}.md"));
        fs::write(&path, render_recommendations(as_of, recommendations))?;
        info!(path = %path.display(), "monitor report written");
        Ok(())
    }
}
