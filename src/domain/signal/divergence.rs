//! Relative divergence against the benchmark proxy.
//!
//! raw(t) = r_inst(t, L) - r_bench(t, L), with r(t, L) = x[t] / x[t-L] - 1
//! and L = `windows.divergence_return`. Negative means the instrument has
//! lagged its benchmark.

use crate::domain::config::DislocationConfig;
use crate::domain::rolling::{pct_change_over, rolling_zscore};
use crate::domain::signal::{LatestSnapshot, Signal, SignalKind, SignalReading, triggered};
use crate::domain::store::{InstrumentSeries, TimeSeriesStore};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct DivergenceSignal {
    pub window: usize,
    pub return_lookback: usize,
    pub threshold: f64,
}

pub struct DivergenceColumn {
    pub ticker: String,
    pub raw: Option<Vec<Option<f64>>>,
    pub zscore: Vec<Option<f64>>,
}

impl DivergenceSignal {
    pub fn from_config(config: &DislocationConfig) -> Self {
        DivergenceSignal {
            window: config.windows.divergence,
            return_lookback: config.windows.divergence_return,
            threshold: config.thresholds.divergence_z,
        }
    }

    pub fn relative_return(&self, series: &InstrumentSeries) -> Option<Vec<Option<f64>>> {
        let benchmark = series.benchmark.as_ref()?;
        let inst = pct_change_over(&series.close, self.return_lookback);
        let bench = pct_change_over(benchmark, self.return_lookback);
        Some(
            inst.iter()
                .zip(&bench)
                .map(|(i, b)| Some((*i)? - (*b)?))
                .collect(),
        )
    }
}

impl Signal for DivergenceSignal {
    type Frame = Vec<DivergenceColumn>;

    fn kind(&self) -> SignalKind {
        SignalKind::Divergence
    }

    fn required_history(&self) -> usize {
        self.return_lookback + self.window + 1
    }

    fn compute(&self, store: &TimeSeriesStore) -> Self::Frame {
        store
            .instruments()
            .iter()
            .map(|series| {
                let raw = self.relative_return(series);
                let zscore = match &raw {
                    Some(raw) => rolling_zscore(raw, self.window),
                    None => vec![None; series.len()],
                };
                DivergenceColumn {
                    ticker: series.ticker.clone(),
                    raw,
                    zscore,
                }
            })
            .collect()
    }

    fn zscores(&self, frame: &Self::Frame) -> BTreeMap<String, Vec<Option<f64>>> {
        frame
            .iter()
            .map(|c| (c.ticker.clone(), c.zscore.clone()))
            .collect()
    }

    fn readings(&self, frame: &Self::Frame, t: usize) -> LatestSnapshot {
        frame
            .iter()
            .map(|column| {
                let reading = match &column.raw {
                    None => SignalReading::unavailable("Benchmark data unavailable"),
                    Some(raw) => {
                        let zscore = column.zscore.get(t).copied().flatten();
                        SignalReading {
                            zscore,
                            triggered: triggered(zscore, self.threshold),
                            value: raw.get(t).copied().flatten(),
                            details: match zscore {
                                Some(z) => format!("Div Z: {z:.2}"),
                                None => "Insufficient data".to_string(),
                            },
                        }
                    }
                };
                (column.ticker.clone(), reading)
            })
            .collect()
    }
}
