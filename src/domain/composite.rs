//! Composite dislocation score.
//!
//! composite = w_pd * z_pd + w_div * z_div - w_vol * |z_vol| - w_xa * |z_xa|
//!
//! Premium/discount and divergence carry direction. Volume and cross-asset
//! stress only amplify: their magnitude always pushes the score towards the
//! cheap side. Negative scores are buy pressure.

use crate::domain::config::WeightConfig;
use crate::domain::signal::{SignalKind, SignalSet};
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalInputs {
    pub premium_discount: Option<f64>,
    pub volume: Option<f64>,
    pub divergence: Option<f64>,
    pub cross_asset: Option<f64>,
}

impl SignalInputs {
    pub fn at(signals: &SignalSet, ticker: &str, t: usize) -> Self {
        SignalInputs {
            premium_discount: signals.zscore(SignalKind::PremiumDiscount, ticker, t),
            volume: signals.zscore(SignalKind::Volume, ticker, t),
            divergence: signals.zscore(SignalKind::Divergence, ticker, t),
            cross_asset: signals.zscore(SignalKind::CrossAsset, ticker, t),
        }
    }

    fn is_empty(&self) -> bool {
        self.premium_discount.is_none()
            && self.volume.is_none()
            && self.divergence.is_none()
            && self.cross_asset.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct CompositeScorer {
    weights: WeightConfig,
}

impl CompositeScorer {
    pub fn new(weights: &WeightConfig) -> Self {
        CompositeScorer {
            weights: weights.clone(),
        }
    }

    /// `None` only when no signal at all is available. Otherwise a missing
    /// signal contributes zero.
    pub fn score(&self, inputs: &SignalInputs) -> Option<f64> {
        if inputs.is_empty() {
            return None;
        }
        let w = &self.weights;
        let (mut w_pd, mut w_div) = (w.premdisc, w.divergence);

        if w.renormalize {
            let total = w_pd + w_div;
            let present = inputs.premium_discount.map_or(0.0, |_| w_pd)
                + inputs.divergence.map_or(0.0, |_| w_div);
            if present > 0.0 {
                let scale = total / present;
                w_pd *= scale;
                w_div *= scale;
            }
        }

        let score = w_pd * inputs.premium_discount.unwrap_or(0.0)
            + w_div * inputs.divergence.unwrap_or(0.0)
            - w.volume * inputs.volume.unwrap_or(0.0).abs()
            - w.cross_asset * inputs.cross_asset.unwrap_or(0.0).abs();
        Some(score)
    }

    pub fn score_table(&self, signals: &SignalSet, tickers: &[String]) -> ScoreTable {
        let columns = tickers
            .iter()
            .map(|ticker| {
                let column = (0..signals.dates.len())
                    .map(|t| self.score(&SignalInputs::at(signals, ticker, t)))
                    .collect();
                (ticker.clone(), column)
            })
            .collect();
        ScoreTable {
            dates: signals.dates.clone(),
            columns,
        }
    }
}

/// Composite score per ticker, aligned to the store timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable {
    pub dates: Vec<NaiveDate>,
    pub columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl ScoreTable {
    pub fn value(&self, ticker: &str, t: usize) -> Option<f64> {
        self.columns.get(ticker).and_then(|c| c.get(t).copied().flatten())
    }

    pub fn latest(&self, ticker: &str) -> Option<f64> {
        self.dates.len().checked_sub(1).and_then(|t| self.value(ticker, t))
    }
}
