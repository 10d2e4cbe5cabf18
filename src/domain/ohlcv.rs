//! Daily bar and dated scalar observations as delivered by providers.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A single dated scalar: NAV print, benchmark close or macro level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: f64,
}

impl DatedValue {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}
