//! Premium/discount to NAV.
//!
//! raw(t) = (close(t) - nav(t)) / nav(t)
//!
//! The NAV column is either the published NAV or the benchmark-derived proxy
//! built by the store. A negative z-score means the instrument trades cheap
//! to its fair value.

use crate::domain::config::DislocationConfig;
use crate::domain::rolling::{required_points, rolling_zscore};
use crate::domain::signal::{LatestSnapshot, Signal, SignalKind, SignalReading, triggered};
use crate::domain::store::{InstrumentSeries, TimeSeriesStore};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct PremiumDiscountSignal {
    pub window: usize,
    pub threshold: f64,
}

pub struct PremiumDiscountColumn {
    pub ticker: String,
    /// `None` when the instrument has neither NAV nor proxy.
    pub raw: Option<Vec<Option<f64>>>,
    pub zscore: Vec<Option<f64>>,
}

impl PremiumDiscountSignal {
    pub fn from_config(config: &DislocationConfig) -> Self {
        PremiumDiscountSignal {
            window: config.windows.premdisc,
            threshold: config.thresholds.premdisc_z,
        }
    }
}

pub fn premium_discount(series: &InstrumentSeries) -> Option<Vec<Option<f64>>> {
    let nav = series.nav.as_ref()?;
    Some(
        series
            .close
            .iter()
            .zip(nav)
            .map(|(c, n)| match (c, n) {
                (Some(c), Some(n)) if *n > 0.0 => Some((c - n) / n),
                _ => None,
            })
            .collect(),
    )
}

impl Signal for PremiumDiscountSignal {
    type Frame = Vec<PremiumDiscountColumn>;

    fn kind(&self) -> SignalKind {
        SignalKind::PremiumDiscount
    }

    fn required_history(&self) -> usize {
        required_points(self.window)
    }

    fn compute(&self, store: &TimeSeriesStore) -> Self::Frame {
        store
            .instruments()
            .iter()
            .map(|series| {
                let raw = premium_discount(series);
                let zscore = match &raw {
                    Some(raw) => rolling_zscore(raw, self.window),
                    None => vec![None; series.len()],
                };
                PremiumDiscountColumn {
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
                    None => SignalReading::unavailable("NAV data unavailable"),
                    Some(raw) => {
                        let value = raw.get(t).copied().flatten();
                        let zscore = column.zscore.get(t).copied().flatten();
                        let details = match (value, zscore) {
                            (Some(v), Some(z)) => {
                                format!("Prem/Disc: {:.2}%, Z: {:.2}", v * 100.0, z)
                            }
                            _ => "Insufficient data".to_string(),
                        };
                        SignalReading {
                            zscore,
                            triggered: triggered(zscore, self.threshold),
                            value,
                            details,
                        }
                    }
                };
                (column.ticker.clone(), reading)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::{DatedValue, OhlcvBar};
    use crate::domain::store::StoreBuilder;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn date(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64)
    }

    fn bars(closes: &[f64]) -> Vec<OhlcvBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| OhlcvBar {
                date: date(i),
                open: *c,
                high: *c,
                low: *c,
                close: *c,
                volume: 1.0,
            })
            .collect()
    }

    fn signal(window: usize) -> PremiumDiscountSignal {
        PremiumDiscountSignal {
            window,
            threshold: 2.0,
        }
    }

    #[test]
    fn raw_is_relative_gap_to_nav() {
        let store = StoreBuilder::new()
            .instrument("AAA", bars(&[99.0, 102.0]))
            .nav("AAA", vec![DatedValue::new(date(0), 100.0), DatedValue::new(date(1), 100.0)])
            .build()
            .unwrap();
        let raw = premium_discount(store.instrument("AAA").unwrap()).unwrap();
        assert_relative_eq!(raw[0].unwrap(), -0.01, epsilon = 1e-12);
        assert_relative_eq!(raw[1].unwrap(), 0.02, epsilon = 1e-12);
    }

    #[test]
    fn deep_discount_triggers_negative() {
        let mut closes: Vec<f64> = (0..10).map(|i| 100.0 + if i % 2 == 0 { 0.1 } else { -0.1 }).collect();
        closes.push(90.0);
        let navs = (0..closes.len()).map(|i| DatedValue::new(date(i), 100.0)).collect();
        let store = StoreBuilder::new()
            .instrument("AAA", bars(&closes))
            .nav("AAA", navs)
            .build()
            .unwrap();

        let snapshot = signal(10).latest_snapshot(&store);
        let reading = &snapshot["AAA"];
        assert!(reading.zscore.unwrap() < -2.0);
        assert!(reading.triggered);
        assert_relative_eq!(reading.value.unwrap(), -0.1, epsilon = 1e-12);
        assert!(reading.details.starts_with("Prem/Disc: -10.00%"));
    }

    #[test]
    fn missing_nav_degrades_to_untriggered() {
        let store = StoreBuilder::new()
            .instrument("AAA", bars(&[100.0; 20]))
            .build()
            .unwrap();
        let snapshot = signal(5).latest_snapshot(&store);
        let reading = &snapshot["AAA"];
        assert!(reading.zscore.is_none());
        assert!(!reading.triggered);
        assert_eq!(reading.details, "NAV data unavailable");

        let table = signal(5).series_table(&store);
        assert!(table.get("AAA").unwrap().iter().all(|z| z.is_none()));
    }

    #[test]
    fn short_history_is_undefined() {
        let navs = (0..5).map(|i| DatedValue::new(date(i), 100.0)).collect();
        let store = StoreBuilder::new()
            .instrument("AAA", bars(&[99.0, 101.0, 98.0, 102.0, 90.0]))
            .nav("AAA", navs)
            .build()
            .unwrap();
        let snapshot = signal(5).latest_snapshot(&store);
        assert!(snapshot["AAA"].zscore.is_none());
        assert_eq!(snapshot["AAA"].details, "Insufficient data");
    }
}
