//! Threshold sweeps over a shared store.
//!
//! Each configuration is an independent pure backtest, so the grid runs on
//! rayon's pool with the store borrowed immutably by every worker.

use crate::domain::backtest::{BacktestResult, run_backtest};
use crate::domain::config::DislocationConfig;
use crate::domain::config_validation::validate_config;
use crate::domain::error::DislocationError;
use crate::domain::store::TimeSeriesStore;
use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ThresholdGrid {
    pub buys: Vec<f64>,
    pub sells: Vec<f64>,
}

impl ThresholdGrid {
    pub fn size(&self) -> usize {
        self.buys.len() * self.sells.len()
    }

    /// One labelled configuration per (buy, sell) pair that passes validation.
    pub fn generate_configs(&self, base: &DislocationConfig) -> Vec<(String, DislocationConfig)> {
        let mut configs = Vec::new();
        for &buy in &self.buys {
            for &sell in &self.sells {
                let mut config = base.clone();
                config.actions.buy = buy;
                config.actions.sell = sell;
                if validate_config(&config).is_err() {
                    continue;
                }
                configs.push((format!("buy={buy:.2},sell={sell:.2}"), config));
            }
        }
        configs
    }
}

pub struct SweepOutcome {
    pub label: String,
    pub result: Result<BacktestResult, DislocationError>,
}

pub fn run_sweep(
    store: &TimeSeriesStore,
    configs: &[(String, DislocationConfig)],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<SweepOutcome> {
    info!(runs = configs.len(), "starting sweep");
    configs
        .par_iter()
        .map(|(label, config)| SweepOutcome {
            label: label.clone(),
            result: run_backtest(store, config, start, end),
        })
        .collect()
}
