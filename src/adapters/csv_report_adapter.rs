//! Flat CSV report writer.

use crate::domain::action::Recommendation;
use crate::domain::backtest::BacktestResult;
use crate::domain::error::DislocationError;
use crate::ports::report_port::ReportPort;
use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use tracing::info;

pub struct CsvReportAdapter;

fn csv_error(path: &Path, e: impl std::fmt::Display) -> DislocationError {
    DislocationError::Data {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

fn write_rows(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<(), DislocationError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    wtr.write_record(header).map_err(|e| csv_error(path, e))?;
    for row in rows {
        wtr.write_record(row).map_err(|e| csv_error(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write_backtest(
        &self,
        result: &BacktestResult,
        out_dir: &Path,
    ) -> Result<(), DislocationError> {
        fs::create_dir_all(out_dir)?;

        let equity_path = out_dir.join("backtest_equity.csv");
        let header: Vec<String> = ["date", "equity", "gross_return", "net_return", "turnover"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows: Vec<Vec<String>> = (0..result.dates.len())
            .map(|t| {
                vec![
                    result.dates[t].to_string(),
                    format!("{:.8}", result.equity_curve[t]),
                    format!("{:.8}", result.gross_returns[t]),
                    format!("{:.8}", result.net_returns[t]),
                    format!("{:.8}", result.turnover[t]),
                ]
            })
            .collect();
        write_rows(&equity_path, &header, &rows)?;

        let weights = &result.weights;
        let weights_path = out_dir.join("backtest_weights.csv");
        let header: Vec<String> = std::iter::once("date".to_string())
            .chain(weights.tickers.iter().cloned())
            .collect();
        let rows: Vec<Vec<String>> = weights
            .dates
            .iter()
            .zip(&weights.rows)
            .map(|(date, row)| {
                std::iter::once(date.to_string())
                    .chain(row.iter().map(|w| format!("{w:.6}")))
                    .collect()
            })
            .collect();
        write_rows(&weights_path, &header, &rows)?;

        let scores_path = out_dir.join("backtest_scores.csv");
        let tickers: Vec<&String> = result.scores.columns.keys().collect();
        let header: Vec<String> = std::iter::once("date".to_string())
            .chain(tickers.iter().map(|t| t.to_string()))
            .collect();
        let rows: Vec<Vec<String>> = result
            .scores
            .dates
            .iter()
            .enumerate()
            .map(|(t, date)| {
                std::iter::once(date.to_string())
                    .chain(tickers.iter().map(|k| fmt_opt(result.scores.value(k, t))))
                    .collect()
            })
            .collect();
        write_rows(&scores_path, &header, &rows)?;

        let m = &result.metrics;
        let metrics_path = out_dir.join("backtest_metrics.csv");
        let rows: Vec<Vec<String>> = [
            ("total_return", m.total_return),
            ("cagr", m.cagr),
            ("volatility", m.volatility),
            ("sharpe_ratio", m.sharpe_ratio),
            ("sortino_ratio", m.sortino_ratio),
            ("max_drawdown", m.max_drawdown),
            ("max_drawdown_duration", m.max_drawdown_duration as f64),
            ("calmar_ratio", m.calmar_ratio),
            ("mean_turnover", m.mean_turnover),
            ("avg_gross_exposure", m.avg_gross_exposure),
        ]
        .iter()
        .map(|(k, v)| vec![k.to_string(), format!("{v:.6}")])
        .collect();
        write_rows(
            &metrics_path,
            &["metric".to_string(), "value".to_string()],
            &rows,
        )?;

        info!(dir = %out_dir.display(), "backtest CSV written");
        Ok(())
    }

    fn write_recommendations(
        &self,
        as_of: NaiveDate,
        recommendations: &[Recommendation],
        out_dir: &Path,
    ) -> Result<(), DislocationError> {
        fs::create_dir_all(out_dir)?;
        let path = out_dir.join(format!("recommendations_{as_of}.csv"));
        let header: Vec<String> = ["ticker", "action", "score", "rationale"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows: Vec<Vec<String>> = recommendations
            .iter()
            .map(|r| {
                vec![
                    r.ticker.clone(),
                    r.action.to_string(),
                    fmt_opt(r.score),
                    r.rationale.clone(),
                ]
            })
            .collect();
        write_rows(&path, &header, &rows)?;
        info!(path = %path.display(), "recommendations CSV written");
        Ok(())
    }
}
