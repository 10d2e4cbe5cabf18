//! Dislocation signals.
//!
//! Every family turns one raw series per instrument into a rolling z-score
//! (see [`crate::domain::rolling`]) and exposes it two ways:
//! - `latest_snapshot`: key -> [`SignalReading`] at the last timeline date
//! - `series_table`: key -> full date-aligned z-score sequence
//!
//! Both are derived from a single [`Signal::compute`] pass. An instrument
//! without the inputs a family needs yields `zscore = None` and
//! `triggered = false`; it never fails the run.

pub mod cross_asset;
pub mod divergence;
pub mod premium_discount;
pub mod volume;

use crate::domain::config::DislocationConfig;
use crate::domain::store::{GLOBAL, TimeSeriesStore};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

pub use cross_asset::CrossAssetSignal;
pub use divergence::DivergenceSignal;
pub use premium_discount::PremiumDiscountSignal;
pub use volume::VolumeSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalKind {
    PremiumDiscount,
    Volume,
    Divergence,
    CrossAsset,
}

impl SignalKind {
    pub const ALL: [SignalKind; 4] = [
        SignalKind::PremiumDiscount,
        SignalKind::Volume,
        SignalKind::Divergence,
        SignalKind::CrossAsset,
    ];
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalKind::PremiumDiscount => "premdisc",
            SignalKind::Volume => "volume",
            SignalKind::Divergence => "divergence",
            SignalKind::CrossAsset => "cross_asset",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalReading {
    pub zscore: Option<f64>,
    pub triggered: bool,
    /// Raw input at the snapshot date.
    pub value: Option<f64>,
    pub details: String,
}

impl SignalReading {
    pub fn unavailable(details: &str) -> Self {
        SignalReading {
            zscore: None,
            triggered: false,
            value: None,
            details: details.to_string(),
        }
    }
}

pub type LatestSnapshot = BTreeMap<String, SignalReading>;

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesTable {
    pub kind: SignalKind,
    pub dates: Vec<NaiveDate>,
    pub columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl SeriesTable {
    pub fn get(&self, key: &str) -> Option<&[Option<f64>]> {
        self.columns.get(key).map(|c| c.as_slice())
    }

    pub fn value(&self, key: &str, t: usize) -> Option<f64> {
        self.columns.get(key).and_then(|c| c.get(t).copied().flatten())
    }
}

/// A family's shared intermediate: keyed z-score columns plus whatever the
/// family needs to describe a reading.
pub trait Signal {
    type Frame;

    fn kind(&self) -> SignalKind;

    /// Timeline rows needed before the first defined z-score.
    fn required_history(&self) -> usize;

    fn compute(&self, store: &TimeSeriesStore) -> Self::Frame;

    fn zscores(&self, frame: &Self::Frame) -> BTreeMap<String, Vec<Option<f64>>>;

    fn readings(&self, frame: &Self::Frame, t: usize) -> LatestSnapshot;

    fn latest_snapshot(&self, store: &TimeSeriesStore) -> LatestSnapshot {
        self.evaluate(store).snapshot
    }

    fn series_table(&self, store: &TimeSeriesStore) -> SeriesTable {
        self.evaluate(store).table
    }

    fn evaluate(&self, store: &TimeSeriesStore) -> SignalOutput {
        let frame = self.compute(store);
        let snapshot = match store.len().checked_sub(1) {
            Some(last) => self.readings(&frame, last),
            None => LatestSnapshot::new(),
        };
        SignalOutput {
            snapshot,
            table: SeriesTable {
                kind: self.kind(),
                dates: store.dates().to_vec(),
                columns: self.zscores(&frame),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalOutput {
    pub snapshot: LatestSnapshot,
    pub table: SeriesTable,
}

pub(crate) fn triggered(zscore: Option<f64>, threshold: f64) -> bool {
    zscore.is_some_and(|z| z.abs() > threshold)
}

/// Every family evaluated once over the same store.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSet {
    pub dates: Vec<NaiveDate>,
    pub premium_discount: SignalOutput,
    pub volume: SignalOutput,
    pub divergence: SignalOutput,
    pub cross_asset: SignalOutput,
}

impl SignalSet {
    pub fn output(&self, kind: SignalKind) -> &SignalOutput {
        match kind {
            SignalKind::PremiumDiscount => &self.premium_discount,
            SignalKind::Volume => &self.volume,
            SignalKind::Divergence => &self.divergence,
            SignalKind::CrossAsset => &self.cross_asset,
        }
    }

    pub fn table(&self, kind: SignalKind) -> &SeriesTable {
        &self.output(kind).table
    }

    /// z-score of `kind` for `ticker` at timeline index `t`. Cross-asset is
    /// read from the `GLOBAL` column for every ticker.
    pub fn zscore(&self, kind: SignalKind, ticker: &str, t: usize) -> Option<f64> {
        let key = if kind == SignalKind::CrossAsset {
            GLOBAL
        } else {
            ticker
        };
        self.table(kind).value(key, t)
    }

    /// Latest readings relevant to `ticker`, in family order.
    pub fn readings_for(&self, ticker: &str) -> Vec<(SignalKind, &SignalReading)> {
        SignalKind::ALL
            .iter()
            .filter_map(|kind| {
                let key = if *kind == SignalKind::CrossAsset {
                    GLOBAL
                } else {
                    ticker
                };
                self.output(*kind).snapshot.get(key).map(|r| (*kind, r))
            })
            .collect()
    }
}

/// Builds every signal family from one configuration.
#[derive(Debug, Clone)]
pub struct SignalComputer {
    pub premium_discount: PremiumDiscountSignal,
    pub volume: VolumeSignal,
    pub divergence: DivergenceSignal,
    pub cross_asset: CrossAssetSignal,
}

impl SignalComputer {
    pub fn new(config: &DislocationConfig) -> Self {
        SignalComputer {
            premium_discount: PremiumDiscountSignal::from_config(config),
            volume: VolumeSignal::from_config(config),
            divergence: DivergenceSignal::from_config(config),
            cross_asset: CrossAssetSignal::from_config(config),
        }
    }

    /// Rows needed ending at a date for every family to be defined there.
    /// Cross-asset only counts when macro series are configured.
    pub fn required_history(&self, with_macros: bool) -> usize {
        let mut required = self
            .premium_discount
            .required_history()
            .max(self.volume.required_history())
            .max(self.divergence.required_history());
        if with_macros {
            required = required.max(self.cross_asset.required_history());
        }
        required
    }

    pub fn compute(&self, store: &TimeSeriesStore) -> SignalSet {
        SignalSet {
            dates: store.dates().to_vec(),
            premium_discount: self.premium_discount.evaluate(store),
            volume: self.volume.evaluate(store),
            divergence: self.divergence.evaluate(store),
            cross_asset: self.cross_asset.evaluate(store),
        }
    }
}

pub fn compute_signals(store: &TimeSeriesStore, config: &DislocationConfig) -> SignalSet {
    SignalComputer::new(config).compute(store)
}
