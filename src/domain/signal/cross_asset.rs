//! Cross-asset stress.
//!
//! Universe-wide, keyed by [`GLOBAL`]. Each configured macro series (already
//! forward-filled onto the timeline) is z-scored on its level; the global
//! value at a date is the component z with the largest magnitude. Credit
//! spread series also trigger on a one-period jump of `oas_jump_bps` or more,
//! with spreads quoted in percent (bps = diff * 100).

use crate::domain::config::DislocationConfig;
use crate::domain::rolling::{diff, required_points, rolling_zscore};
use crate::domain::signal::{LatestSnapshot, Signal, SignalKind, SignalReading, triggered};
use crate::domain::store::{GLOBAL, MacroKind, TimeSeriesStore};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct CrossAssetSignal {
    pub window: usize,
    pub threshold: f64,
    pub oas_jump_bps: f64,
}

pub struct MacroComponent {
    pub id: String,
    pub level: Vec<Option<f64>>,
    pub zscore: Vec<Option<f64>>,
    /// Only for credit spreads.
    pub jump_bps: Option<Vec<Option<f64>>>,
}

pub struct CrossAssetFrame {
    pub len: usize,
    pub components: Vec<MacroComponent>,
}

impl CrossAssetFrame {
    /// Index of the component with the largest |z| at `t`.
    fn dominant(&self, t: usize) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, c) in self.components.iter().enumerate() {
            if let Some(z) = c.zscore.get(t).copied().flatten() {
                if best.is_none_or(|(_, b)| z.abs() > b.abs()) {
                    best = Some((i, z));
                }
            }
        }
        best.map(|(i, _)| i)
    }

    pub fn global_zscore(&self) -> Vec<Option<f64>> {
        (0..self.len)
            .map(|t| {
                self.dominant(t)
                    .and_then(|i| self.components[i].zscore[t])
            })
            .collect()
    }
}

impl CrossAssetSignal {
    pub fn from_config(config: &DislocationConfig) -> Self {
        CrossAssetSignal {
            window: config.windows.cross_asset,
            threshold: config.thresholds.cross_asset_z,
            oas_jump_bps: config.thresholds.oas_jump_bps,
        }
    }
}

impl Signal for CrossAssetSignal {
    type Frame = CrossAssetFrame;

    fn kind(&self) -> SignalKind {
        SignalKind::CrossAsset
    }

    fn required_history(&self) -> usize {
        required_points(self.window)
    }

    fn compute(&self, store: &TimeSeriesStore) -> Self::Frame {
        let components = store
            .macros()
            .iter()
            .map(|m| MacroComponent {
                id: m.id.clone(),
                level: m.values.clone(),
                zscore: rolling_zscore(&m.values, self.window),
                jump_bps: (m.kind == MacroKind::CreditSpread).then(|| {
                    diff(&m.values)
                        .into_iter()
                        .map(|d| d.map(|d| d * 100.0))
                        .collect()
                }),
            })
            .collect();
        CrossAssetFrame {
            len: store.len(),
            components,
        }
    }

    fn zscores(&self, frame: &Self::Frame) -> BTreeMap<String, Vec<Option<f64>>> {
        BTreeMap::from([(GLOBAL.to_string(), frame.global_zscore())])
    }

    fn readings(&self, frame: &Self::Frame, t: usize) -> LatestSnapshot {
        let reading = if frame.components.is_empty() {
            SignalReading::unavailable("No macro data")
        } else {
            let mut reasons = Vec::new();
            for c in &frame.components {
                if let Some(jump) = c.jump_bps.as_ref().and_then(|j| j.get(t).copied().flatten()) {
                    if jump >= self.oas_jump_bps {
                        reasons.push(format!("{} +{:.0}bps", c.id, jump));
                    }
                }
                let z = c.zscore.get(t).copied().flatten();
                if let (true, Some(z)) = (triggered(z, self.threshold), z) {
                    reasons.push(format!("{} Z: {:.2}", c.id, z));
                }
            }
            let dominant = frame.dominant(t);
            let zscore = dominant.and_then(|i| frame.components[i].zscore[t]);
            let value = dominant.and_then(|i| frame.components[i].level[t]);
            let details = if !reasons.is_empty() {
                reasons.join(", ")
            } else if zscore.is_none() {
                "Insufficient data".to_string()
            } else {
                "Normal".to_string()
            };
            SignalReading {
                zscore,
                triggered: !reasons.is_empty(),
                value,
                details,
            }
        };
        LatestSnapshot::from([(GLOBAL.to_string(), reading)])
    }
}
