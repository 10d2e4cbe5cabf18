//! Data provider port traits.
//!
//! Providers never fail a run: an unreadable or missing source yields an
//! empty result and the gap is handled downstream.

use crate::domain::ohlcv::{DatedValue, OhlcvBar};
use chrono::NaiveDate;

pub trait PriceProvider {
    /// Daily bars for each ticker with data in `[start, end]`. Tickers with
    /// no data are omitted.
    fn fetch_prices(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<(String, Vec<OhlcvBar>)>;
}

pub trait NavProvider {
    /// Published NAV history, or `None` when the ticker publishes none.
    fn fetch_nav(&self, ticker: &str, start: NaiveDate, end: NaiveDate)
    -> Option<Vec<DatedValue>>;
}

pub trait MacroProvider {
    fn fetch_macro(&self, series_id: &str, start: NaiveDate, end: NaiveDate) -> Vec<DatedValue>;
}
