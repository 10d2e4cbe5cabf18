//! Composite score to action or target weight.
//!
//! Monitoring maps a score to BUY / HOLD / SELL with inclusive bounds.
//! Backtesting folds scores into a held target weight per instrument, then
//! applies per-instrument, gross and net caps on each date.

use crate::domain::composite::ScoreTable;
use crate::domain::config::{ActionThresholds, RiskConfig};
use crate::domain::signal::{SignalKind, SignalReading};
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Buy,
    Hold,
    Sell,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Hold => write!(f, "HOLD"),
            Action::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recommendation {
    pub ticker: String,
    pub action: Action,
    pub score: Option<f64>,
    pub signals: Vec<(SignalKind, SignalReading)>,
    pub rationale: String,
}

/// Target weights, one row per timeline date in `[start, end]`.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    pub dates: Vec<NaiveDate>,
    pub tickers: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl WeightTable {
    pub fn gross(&self, t: usize) -> f64 {
        self.rows[t].iter().map(|w| w.abs()).sum()
    }

    pub fn net(&self, t: usize) -> f64 {
        self.rows[t].iter().sum()
    }

    pub fn column(&self, ticker: &str) -> Option<Vec<f64>> {
        let i = self.tickers.iter().position(|t| t == ticker)?;
        Some(self.rows.iter().map(|row| row[i]).collect())
    }
}

#[derive(Debug, Clone)]
pub struct ActionMapper {
    thresholds: ActionThresholds,
    risk: RiskConfig,
}

impl ActionMapper {
    pub fn new(thresholds: &ActionThresholds, risk: &RiskConfig) -> Self {
        ActionMapper {
            thresholds: thresholds.clone(),
            risk: risk.clone(),
        }
    }

    pub fn action(&self, score: Option<f64>) -> Action {
        match score {
            Some(s) if s <= self.thresholds.buy => Action::Buy,
            Some(s) if s >= self.thresholds.sell => Action::Sell,
            _ => Action::Hold,
        }
    }

    fn sized(&self, score: f64) -> f64 {
        self.risk.max_weight * (score.abs() / self.risk.full_weight_score).min(1.0)
    }

    /// One step of the holding fold: enter on buy, exit on sell or once the
    /// score has reverted inside the neutral band, otherwise keep `prev`.
    pub fn next_weight(&self, prev: f64, score: Option<f64>) -> f64 {
        let Some(score) = score else {
            return prev;
        };
        if score <= self.thresholds.buy {
            self.sized(score)
        } else if score >= self.thresholds.sell {
            if self.risk.allow_short {
                -self.sized(score)
            } else {
                0.0
            }
        } else if score.abs() < self.thresholds.neutral {
            0.0
        } else {
            prev
        }
    }

    /// Clip to `±max_weight`, then scale down for the gross and net caps.
    /// A negative or NaN `max_weight` clips everything to flat.
    pub fn apply_caps(&self, row: &mut [f64]) {
        let max = self.risk.max_weight.max(0.0);
        for w in row.iter_mut() {
            *w = w.clamp(-max, max);
        }
        let gross: f64 = row.iter().map(|w| w.abs()).sum();
        if gross > self.risk.max_gross_exposure {
            let scale = self.risk.max_gross_exposure / gross;
            row.iter_mut().for_each(|w| *w *= scale);
        }
        let net: f64 = row.iter().sum();
        if net.abs() > self.risk.max_net_exposure {
            let scale = self.risk.max_net_exposure / net.abs();
            row.iter_mut().for_each(|w| *w *= scale);
        }
    }

    /// Fold scores over timeline indices `start..=end`, starting flat.
    ///
    /// The held state is the uncapped target so that a cap binding on one
    /// date does not shrink the position permanently.
    pub fn target_weights(&self, scores: &ScoreTable, start: usize, end: usize) -> WeightTable {
        let tickers: Vec<String> = scores.columns.keys().cloned().collect();
        let mut held = vec![0.0; tickers.len()];
        let mut rows = Vec::with_capacity(end.saturating_sub(start) + 1);

        for t in start..=end {
            for (i, ticker) in tickers.iter().enumerate() {
                held[i] = self.next_weight(held[i], scores.value(ticker, t));
            }
            let mut row = held.clone();
            self.apply_caps(&mut row);
            rows.push(row);
        }

        WeightTable {
            dates: scores.dates[start..=end].to_vec(),
            tickers,
            rows,
        }
    }
}

pub fn rationale(
    ticker: &str,
    action: Action,
    score: Option<f64>,
    readings: &[(SignalKind, SignalReading)],
) -> String {
    let triggered: Vec<&str> = readings
        .iter()
        .filter(|(_, r)| r.triggered)
        .map(|(_, r)| r.details.as_str())
        .collect();
    let reasons = if triggered.is_empty() {
        "No specific triggers".to_string()
    } else {
        triggered.join(", ")
    };
    let score = match score {
        Some(s) => format!("{s:.2}"),
        None => "n/a".to_string(),
    };
    format!("{action}: {ticker} ({reasons}); composite={score}")
}
