//! CSV file data adapter.
//!
//! Directory layout under the base path:
//!
//! - `{TICKER}.csv` with `date,open,high,low,close,volume`
//! - `nav/{TICKER}.csv` with `date,nav`
//! - `macro/{SERIES_ID}.csv` with `date,value`
//!
//! Blank numeric fields are read as gaps. An unreadable file is logged and
//! treated as no data.

use crate::domain::error::DislocationError;
use crate::domain::ohlcv::{DatedValue, OhlcvBar};
use crate::ports::data_port::{MacroProvider, NavProvider, PriceProvider};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn price_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }

    fn nav_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join("nav").join(format!("{ticker}.csv"))
    }

    fn macro_path(&self, series_id: &str) -> PathBuf {
        self.base_path.join("macro").join(format!("{series_id}.csv"))
    }

    pub fn read_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, DislocationError> {
        let path = self.price_path(ticker);
        let mut bars = Vec::new();
        for record in read_records(&path)? {
            let date = parse_date(&record, &path)?;
            if date < start || date > end {
                continue;
            }
            bars.push(OhlcvBar {
                date,
                open: parse_field(&record, 1, "open", &path)?,
                high: parse_field(&record, 2, "high", &path)?,
                low: parse_field(&record, 3, "low", &path)?,
                close: parse_field(&record, 4, "close", &path)?,
                volume: parse_field(&record, 5, "volume", &path)?,
            });
        }
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn read_values(
        &self,
        path: &Path,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DatedValue>, DislocationError> {
        let mut values = Vec::new();
        for record in read_records(path)? {
            let date = parse_date(&record, path)?;
            if date < start || date > end {
                continue;
            }
            values.push(DatedValue::new(date, parse_field(&record, 1, "value", path)?));
        }
        values.sort_by_key(|v| v.date);
        Ok(values)
    }
}

fn read_records(path: &Path) -> Result<Vec<csv::StringRecord>, DislocationError> {
    let content = fs::read_to_string(path).map_err(|e| DislocationError::Data {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    rdr.records()
        .map(|r| {
            r.map_err(|e| DislocationError::Data {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })
        })
        .collect()
}

fn parse_date(record: &csv::StringRecord, path: &Path) -> Result<NaiveDate, DislocationError> {
    let raw = record.get(0).ok_or_else(|| DislocationError::Data {
        reason: format!("missing date column in {}", path.display()),
    })?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| DislocationError::Data {
        reason: format!("invalid date '{}' in {}: {}", raw, path.display(), e),
    })
}

fn parse_field(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    path: &Path,
) -> Result<f64, DislocationError> {
    match record.get(index) {
        None | Some("") => Ok(f64::NAN),
        Some(raw) => raw.parse().map_err(|e| DislocationError::Data {
            reason: format!("invalid {} value '{}' in {}: {}", name, raw, path.display(), e),
        }),
    }
}

impl PriceProvider for CsvAdapter {
    fn fetch_prices(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<(String, Vec<OhlcvBar>)> {
        tickers
            .iter()
            .filter_map(|ticker| match self.read_bars(ticker, start, end) {
                Ok(bars) if !bars.is_empty() => Some((ticker.clone(), bars)),
                Ok(_) => {
                    debug!(ticker = %ticker, "no bars in range");
                    None
                }
                Err(e) => {
                    warn!(ticker = %ticker, error = %e, "price fetch failed");
                    None
                }
            })
            .collect()
    }
}

impl NavProvider for CsvAdapter {
    fn fetch_nav(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<Vec<DatedValue>> {
        let path = self.nav_path(ticker);
        if !path.exists() {
            return None;
        }
        match self.read_values(&path, start, end) {
            Ok(values) if !values.is_empty() => Some(values),
            Ok(_) => None,
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "NAV fetch failed");
                None
            }
        }
    }
}

impl MacroProvider for CsvAdapter {
    fn fetch_macro(&self, series_id: &str, start: NaiveDate, end: NaiveDate) -> Vec<DatedValue> {
        match self.read_values(&self.macro_path(series_id), start, end) {
            Ok(values) => values,
            Err(e) => {
                warn!(series = %series_id, error = %e, "macro fetch failed");
                Vec::new()
            }
        }
    }
}
