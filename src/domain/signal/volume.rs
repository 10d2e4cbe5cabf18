//! Volume/liquidity stress.
//!
//! Two z-scores per instrument: traded volume over `windows.volume` and the
//! intraday range proxy `(high - low) / close` over `windows.range`. The
//! series table carries the volume z-score; the snapshot triggers when
//! either one breaches its threshold. Used only as a magnitude amplifier.

use crate::domain::config::DislocationConfig;
use crate::domain::rolling::{required_points, rolling_zscore};
use crate::domain::signal::{LatestSnapshot, Signal, SignalKind, SignalReading, triggered};
use crate::domain::store::TimeSeriesStore;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct VolumeSignal {
    pub window: usize,
    pub range_window: usize,
    pub threshold: f64,
    pub range_threshold: f64,
}

pub struct VolumeColumn {
    pub ticker: String,
    pub volume: Vec<Option<f64>>,
    pub volume_z: Vec<Option<f64>>,
    pub range_z: Vec<Option<f64>>,
}

impl VolumeSignal {
    pub fn from_config(config: &DislocationConfig) -> Self {
        VolumeSignal {
            window: config.windows.volume,
            range_window: config.windows.range,
            threshold: config.thresholds.volume_z,
            range_threshold: config.thresholds.range_z,
        }
    }
}

impl Signal for VolumeSignal {
    type Frame = Vec<VolumeColumn>;

    fn kind(&self) -> SignalKind {
        SignalKind::Volume
    }

    fn required_history(&self) -> usize {
        required_points(self.window).max(required_points(self.range_window))
    }

    fn compute(&self, store: &TimeSeriesStore) -> Self::Frame {
        store
            .instruments()
            .iter()
            .map(|series| VolumeColumn {
                ticker: series.ticker.clone(),
                volume: series.volume.clone(),
                volume_z: rolling_zscore(&series.volume, self.window),
                range_z: rolling_zscore(&series.range_proxy(), self.range_window),
            })
            .collect()
    }

    fn zscores(&self, frame: &Self::Frame) -> BTreeMap<String, Vec<Option<f64>>> {
        frame
            .iter()
            .map(|c| (c.ticker.clone(), c.volume_z.clone()))
            .collect()
    }

    fn readings(&self, frame: &Self::Frame, t: usize) -> LatestSnapshot {
        frame
            .iter()
            .map(|column| {
                let volume_z = column.volume_z.get(t).copied().flatten();
                let range_z = column.range_z.get(t).copied().flatten();
                let volume_hit = triggered(volume_z, self.threshold);
                let range_hit = triggered(range_z, self.range_threshold);

                let mut details = Vec::new();
                if let (true, Some(z)) = (volume_hit, volume_z) {
                    details.push(format!("Vol Z: {z:.2}"));
                }
                if let (true, Some(z)) = (range_hit, range_z) {
                    details.push(format!("Range Z: {z:.2}"));
                }
                let details = if !details.is_empty() {
                    details.join(", ")
                } else if volume_z.is_none() && range_z.is_none() {
                    "Insufficient data".to_string()
                } else {
                    "Normal".to_string()
                };

                let reading = SignalReading {
                    zscore: volume_z,
                    triggered: volume_hit || range_hit,
                    value: column.volume.get(t).copied().flatten(),
                    details,
                };
                (column.ticker.clone(), reading)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::store::StoreBuilder;
    use chrono::NaiveDate;

    fn date(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64)
    }

    fn bar(i: usize, volume: f64, spread: f64) -> OhlcvBar {
        OhlcvBar {
            date: date(i),
            open: 100.0,
            high: 100.0 + spread,
            low: 100.0 - spread,
            close: 100.0,
            volume,
        }
    }

    fn signal() -> VolumeSignal {
        VolumeSignal {
            window: 10,
            range_window: 10,
            threshold: 2.0,
            range_threshold: 2.0,
        }
    }

    fn wobble(i: usize) -> f64 {
        if i % 2 == 0 { 1.0 } else { -1.0 }
    }

    #[test]
    fn volume_spike_triggers() {
        let mut bars: Vec<OhlcvBar> = (0..10)
            .map(|i| bar(i, 1000.0 + 10.0 * wobble(i), 1.0 + 0.01 * wobble(i)))
            .collect();
        bars.push(bar(10, 5000.0, 1.0));
        let store = StoreBuilder::new().instrument("AAA", bars).build().unwrap();

        let snapshot = signal().latest_snapshot(&store);
        let reading = &snapshot["AAA"];
        assert!(reading.triggered);
        assert!(reading.zscore.unwrap() > 2.0);
        assert!(reading.details.starts_with("Vol Z: "));
        assert_eq!(reading.value, Some(5000.0));
    }

    #[test]
    fn range_spike_alone_triggers() {
        let mut bars: Vec<OhlcvBar> = (0..10)
            .map(|i| bar(i, 1000.0 + 10.0 * wobble(i), 1.0 + 0.01 * wobble(i)))
            .collect();
        bars.push(bar(10, 1000.0, 5.0));
        let store = StoreBuilder::new().instrument("AAA", bars).build().unwrap();

        let reading = &signal().latest_snapshot(&store)["AAA"];
        assert!(reading.triggered);
        assert!(reading.zscore.unwrap().abs() <= 2.0);
        assert!(reading.details.starts_with("Range Z: "));
    }

    #[test]
    fn constant_volume_is_undefined() {
        let bars: Vec<OhlcvBar> = (0..15).map(|i| bar(i, 1000.0, 1.0)).collect();
        let store = StoreBuilder::new().instrument("AAA", bars).build().unwrap();
        let table = signal().series_table(&store);
        assert!(table.get("AAA").unwrap().iter().all(|z| z.is_none()));

        let reading = &signal().latest_snapshot(&store)["AAA"];
        assert!(!reading.triggered);
        assert_eq!(reading.details, "Insufficient data");
    }
}
