//! Report generation port trait.

use crate::domain::action::Recommendation;
use crate::domain::backtest::BacktestResult;
use crate::domain::error::DislocationError;
use chrono::NaiveDate;
use std::path::Path;

/// Port for writing run outputs under a directory.
pub trait ReportPort {
    fn write_backtest(&self, result: &BacktestResult, out_dir: &Path)
    -> Result<(), DislocationError>;

    fn write_recommendations(
        &self,
        as_of: NaiveDate,
        recommendations: &[Recommendation],
        out_dir: &Path,
    ) -> Result<(), DislocationError>;
}
