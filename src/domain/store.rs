//! Aligned per-instrument series and the unified trading timeline.
//!
//! Every column in a [`TimeSeriesStore`] has exactly one slot per timeline
//! date. Gaps are `None`, never dropped rows, so index `i` means the same
//! date in every series.

use crate::domain::error::DislocationError;
use crate::domain::ohlcv::{DatedValue, OhlcvBar};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

/// Reserved key for universe-wide signals such as cross-asset stress.
pub const GLOBAL: &str = "GLOBAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    Volatility,
    CreditSpread,
}

#[derive(Debug, Clone)]
pub struct MacroSeries {
    pub id: String,
    pub kind: MacroKind,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct InstrumentSeries {
    pub ticker: String,
    pub open: Vec<Option<f64>>,
    pub high: Vec<Option<f64>>,
    pub low: Vec<Option<f64>>,
    pub close: Vec<Option<f64>>,
    pub volume: Vec<Option<f64>>,
    /// Published NAV or the benchmark-derived proxy. `None` when neither exists.
    pub nav: Option<Vec<Option<f64>>>,
    pub benchmark: Option<Vec<Option<f64>>>,
}

impl InstrumentSeries {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    pub fn valid_closes(&self) -> usize {
        self.close.iter().filter(|c| c.is_some()).count()
    }

    pub fn range_proxy(&self) -> Vec<Option<f64>> {
        (0..self.len())
            .map(|i| match (self.high[i], self.low[i], self.close[i]) {
                (Some(h), Some(l), Some(c)) if c > 0.0 => Some((h - l) / c),
                _ => None,
            })
            .collect()
    }

    /// Simple return against the last valid close at every present bar;
    /// `None` at gaps and before the first close. A move across a gap is
    /// credited on the bar that ends it.
    pub fn close_returns(&self) -> Vec<Option<f64>> {
        let mut last_valid: Option<f64> = None;
        self.close
            .iter()
            .map(|&close| {
                let curr = close?;
                let ret = match last_valid {
                    Some(prev) if prev > 0.0 => Some(curr / prev - 1.0),
                    _ => None,
                };
                last_valid = Some(curr);
                ret
            })
            .collect()
    }

    fn truncated(&self, len: usize) -> Self {
        let cut = |v: &Vec<Option<f64>>| v[..len].to_vec();
        InstrumentSeries {
            ticker: self.ticker.clone(),
            open: cut(&self.open),
            high: cut(&self.high),
            low: cut(&self.low),
            close: cut(&self.close),
            volume: cut(&self.volume),
            nav: self.nav.as_ref().map(cut),
            benchmark: self.benchmark.as_ref().map(cut),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    dates: Vec<NaiveDate>,
    instruments: Vec<InstrumentSeries>,
    macros: Vec<MacroSeries>,
    date_index: HashMap<NaiveDate, usize>,
}

impl TimeSeriesStore {
    pub fn new(
        dates: Vec<NaiveDate>,
        instruments: Vec<InstrumentSeries>,
        macros: Vec<MacroSeries>,
    ) -> Result<Self, DislocationError> {
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DislocationError::Data {
                reason: "timeline dates must be strictly increasing".into(),
            });
        }
        let n = dates.len();
        for inst in &instruments {
            let columns = [
                Some(&inst.open),
                Some(&inst.high),
                Some(&inst.low),
                Some(&inst.close),
                Some(&inst.volume),
                inst.nav.as_ref(),
                inst.benchmark.as_ref(),
            ];
            if columns.iter().flatten().any(|c| c.len() != n) {
                return Err(DislocationError::Data {
                    reason: format!("series for {} is not aligned to the timeline", inst.ticker),
                });
            }
        }
        if let Some(m) = macros.iter().find(|m| m.values.len() != n) {
            return Err(DislocationError::Data {
                reason: format!("macro series {} is not aligned to the timeline", m.id),
            });
        }
        let date_index = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
        Ok(Self {
            dates,
            instruments,
            macros,
            date_index,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn instruments(&self) -> &[InstrumentSeries] {
        &self.instruments
    }

    pub fn macros(&self) -> &[MacroSeries] {
        &self.macros
    }

    pub fn instrument(&self, ticker: &str) -> Option<&InstrumentSeries> {
        self.instruments.iter().find(|s| s.ticker == ticker)
    }

    pub fn tickers(&self) -> Vec<String> {
        self.instruments.iter().map(|s| s.ticker.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    /// First timeline index whose date is on or after `date`.
    pub fn index_on_or_after(&self, date: NaiveDate) -> Option<usize> {
        let i = self.dates.partition_point(|d| *d < date);
        (i < self.dates.len()).then_some(i)
    }

    /// Last timeline index whose date is on or before `date`.
    pub fn index_on_or_before(&self, date: NaiveDate) -> Option<usize> {
        self.dates.partition_point(|d| *d <= date).checked_sub(1)
    }

    /// A copy of the store holding only dates up to and including `as_of`.
    pub fn truncated_to(&self, as_of: NaiveDate) -> Self {
        let len = self.index_on_or_before(as_of).map_or(0, |i| i + 1);
        let dates = self.dates[..len].to_vec();
        let date_index = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
        TimeSeriesStore {
            dates,
            instruments: self.instruments.iter().map(|s| s.truncated(len)).collect(),
            macros: self
                .macros
                .iter()
                .map(|m| MacroSeries {
                    id: m.id.clone(),
                    kind: m.kind,
                    values: m.values[..len].to_vec(),
                })
                .collect(),
            date_index,
        }
    }
}

/// Collects raw provider output and normalizes it into one [`TimeSeriesStore`].
///
/// The timeline is the union of all instrument bar dates. NAV and benchmark
/// values are matched on exact dates; macro values are forward-filled from the
/// last observation on or before each timeline date.
#[derive(Debug, Default)]
pub struct StoreBuilder {
    bars: Vec<(String, Vec<OhlcvBar>)>,
    navs: HashMap<String, Vec<DatedValue>>,
    benchmarks: HashMap<String, Vec<DatedValue>>,
    macros: Vec<(String, MacroKind, Vec<DatedValue>)>,
    nav_proxy: bool,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instrument(mut self, ticker: &str, bars: Vec<OhlcvBar>) -> Self {
        self.bars.push((ticker.to_string(), bars));
        self
    }

    pub fn nav(mut self, ticker: &str, values: Vec<DatedValue>) -> Self {
        self.navs.insert(ticker.to_string(), values);
        self
    }

    pub fn benchmark(mut self, ticker: &str, values: Vec<DatedValue>) -> Self {
        self.benchmarks.insert(ticker.to_string(), values);
        self
    }

    pub fn macro_series(mut self, id: &str, kind: MacroKind, values: Vec<DatedValue>) -> Self {
        self.macros.push((id.to_string(), kind, values));
        self
    }

    /// Derive a NAV proxy from the benchmark when no NAV is published.
    pub fn nav_proxy(mut self, enabled: bool) -> Self {
        self.nav_proxy = enabled;
        self
    }

    pub fn build(self) -> Result<TimeSeriesStore, DislocationError> {
        let mut seen = BTreeSet::new();
        for (ticker, _) in &self.bars {
            if !seen.insert(ticker.as_str()) {
                return Err(DislocationError::Data {
                    reason: format!("duplicate instrument {ticker}"),
                });
            }
        }

        let mut per_ticker = Vec::with_capacity(self.bars.len());
        for (ticker, mut bars) in self.bars {
            bars.sort_by_key(|b| b.date);
            if let Some(w) = bars.windows(2).find(|w| w[0].date == w[1].date) {
                return Err(DislocationError::Data {
                    reason: format!("duplicate bar for {} on {}", ticker, w[0].date),
                });
            }
            per_ticker.push((ticker, bars));
        }

        let dates = build_unified_timeline(&per_ticker);

        let instruments = per_ticker
            .into_iter()
            .map(|(ticker, bars)| {
                let mut series = align_bars(&ticker, &dates, &bars);
                let benchmark = self.benchmarks.get(&ticker).map(|v| align_exact(&dates, v));
                let nav = match self.navs.get(&ticker) {
                    Some(v) => Some(align_exact(&dates, v)),
                    None if self.nav_proxy => {
                        benchmark.as_ref().and_then(|b| nav_proxy(&series.close, b))
                    }
                    None => None,
                };
                series.nav = nav;
                series.benchmark = benchmark;
                series
            })
            .collect();

        let macros = self
            .macros
            .into_iter()
            .map(|(id, kind, values)| MacroSeries {
                id,
                kind,
                values: align_forward_filled(&dates, &values),
            })
            .collect();

        TimeSeriesStore::new(dates, instruments, macros)
    }
}

pub fn build_unified_timeline(bars: &[(String, Vec<OhlcvBar>)]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = bars
        .iter()
        .flat_map(|(_, b)| b.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn align_bars(ticker: &str, dates: &[NaiveDate], bars: &[OhlcvBar]) -> InstrumentSeries {
    let by_date: HashMap<NaiveDate, &OhlcvBar> = bars.iter().map(|b| (b.date, b)).collect();
    let column = |f: fn(&OhlcvBar) -> f64| -> Vec<Option<f64>> {
        dates
            .iter()
            .map(|d| by_date.get(d).and_then(|b| finite(f(b))))
            .collect()
    };
    InstrumentSeries {
        ticker: ticker.to_string(),
        open: column(|b| b.open),
        high: column(|b| b.high),
        low: column(|b| b.low),
        close: column(|b| b.close),
        volume: column(|b| b.volume),
        nav: None,
        benchmark: None,
    }
}

pub fn align_exact(dates: &[NaiveDate], values: &[DatedValue]) -> Vec<Option<f64>> {
    let by_date: HashMap<NaiveDate, f64> = values.iter().map(|v| (v.date, v.value)).collect();
    dates
        .iter()
        .map(|d| by_date.get(d).copied().and_then(finite))
        .collect()
}

pub fn align_forward_filled(dates: &[NaiveDate], values: &[DatedValue]) -> Vec<Option<f64>> {
    let mut sorted: Vec<DatedValue> = values.iter().copied().filter(|v| v.value.is_finite()).collect();
    sorted.sort_by_key(|v| v.date);

    let mut out = Vec::with_capacity(dates.len());
    let mut cursor = 0;
    let mut last = None;
    for d in dates {
        while cursor < sorted.len() && sorted[cursor].date <= *d {
            last = Some(sorted[cursor].value);
            cursor += 1;
        }
        out.push(last);
    }
    out
}

/// `close(t0) * benchmark(t) / benchmark(t0)`, anchored at the first date
/// where both are present and positive.
pub fn nav_proxy(close: &[Option<f64>], benchmark: &[Option<f64>]) -> Option<Vec<Option<f64>>> {
    let t0 = close
        .iter()
        .zip(benchmark)
        .position(|(c, b)| matches!((c, b), (Some(c), Some(b)) if *c > 0.0 && *b > 0.0))?;
    let (c0, b0) = (close[t0]?, benchmark[t0]?);
    Some(
        benchmark
            .iter()
            .enumerate()
            .map(|(i, b)| if i < t0 { None } else { b.map(|b| c0 * b / b0) })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn bar(day: u32, close: f64) -> OhlcvBar {
        OhlcvBar {
            date: d(day),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn unified_timeline_keeps_gaps_explicit() {
        let store = StoreBuilder::new()
            .instrument("AAA", vec![bar(2, 10.0), bar(5, 11.0)])
            .instrument("BBB", vec![bar(1, 20.0), bar(3, 21.0)])
            .build()
            .unwrap();

        assert_eq!(store.dates(), &[d(1), d(2), d(3), d(5)]);
        let a = store.instrument("AAA").unwrap();
        assert_eq!(a.close, vec![None, Some(10.0), None, Some(11.0)]);
        let b = store.instrument("BBB").unwrap();
        assert_eq!(b.close, vec![Some(20.0), None, Some(21.0), None]);
    }

    #[test]
    fn unsorted_bars_are_ordered() {
        let store = StoreBuilder::new()
            .instrument("AAA", vec![bar(3, 12.0), bar(1, 10.0), bar(2, 11.0)])
            .build()
            .unwrap();
        assert_eq!(store.dates(), &[d(1), d(2), d(3)]);
        assert_eq!(
            store.instrument("AAA").unwrap().close,
            vec![Some(10.0), Some(11.0), Some(12.0)]
        );
    }

    #[test]
    fn duplicate_bar_dates_are_rejected() {
        let result = StoreBuilder::new()
            .instrument("AAA", vec![bar(1, 10.0), bar(1, 10.5)])
            .build();
        assert!(matches!(result, Err(DislocationError::Data { .. })));
    }

    #[test]
    fn duplicate_instrument_is_rejected() {
        let result = StoreBuilder::new()
            .instrument("AAA", vec![bar(1, 10.0)])
            .instrument("AAA", vec![bar(2, 10.0)])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn non_finite_values_become_gaps() {
        let store = StoreBuilder::new()
            .instrument("AAA", vec![bar(1, f64::NAN), bar(2, 10.0)])
            .build()
            .unwrap();
        assert_eq!(store.instrument("AAA").unwrap().close, vec![None, Some(10.0)]);
    }

    #[test]
    fn macro_values_forward_fill_without_backfill() {
        let store = StoreBuilder::new()
            .instrument("AAA", vec![bar(1, 10.0), bar(2, 10.0), bar(3, 10.0), bar(4, 10.0)])
            .macro_series(
                "VIX",
                MacroKind::Volatility,
                vec![DatedValue::new(d(2), 15.0), DatedValue::new(d(4), 18.0)],
            )
            .build()
            .unwrap();
        assert_eq!(
            store.macros()[0].values,
            vec![None, Some(15.0), Some(15.0), Some(18.0)]
        );
    }

    #[test]
    fn published_nav_wins_over_proxy() {
        let store = StoreBuilder::new()
            .instrument("AAA", vec![bar(1, 10.0), bar(2, 10.0)])
            .nav("AAA", vec![DatedValue::new(d(1), 10.1), DatedValue::new(d(2), 10.2)])
            .benchmark("AAA", vec![DatedValue::new(d(1), 500.0), DatedValue::new(d(2), 510.0)])
            .nav_proxy(true)
            .build()
            .unwrap();
        assert_eq!(
            store.instrument("AAA").unwrap().nav,
            Some(vec![Some(10.1), Some(10.2)])
        );
    }

    #[test]
    fn nav_proxy_scales_benchmark_to_first_close() {
        let store = StoreBuilder::new()
            .instrument("AAA", vec![bar(1, 10.0), bar(2, 10.0), bar(3, 10.0)])
            .benchmark(
                "AAA",
                vec![
                    DatedValue::new(d(1), 500.0),
                    DatedValue::new(d(2), 550.0),
                    DatedValue::new(d(3), 450.0),
                ],
            )
            .nav_proxy(true)
            .build()
            .unwrap();
        let nav = store.instrument("AAA").unwrap().nav.clone().unwrap();
        assert!((nav[0].unwrap() - 10.0).abs() < 1e-12);
        assert!((nav[1].unwrap() - 11.0).abs() < 1e-12);
        assert!((nav[2].unwrap() - 9.0).abs() < 1e-12);
    }

    #[test]
    fn no_nav_and_no_proxy_leaves_nav_unavailable() {
        let store = StoreBuilder::new()
            .instrument("AAA", vec![bar(1, 10.0)])
            .benchmark("AAA", vec![DatedValue::new(d(1), 500.0)])
            .build()
            .unwrap();
        let a = store.instrument("AAA").unwrap();
        assert!(a.nav.is_none());
        assert!(a.benchmark.is_some());
    }

    #[test]
    fn close_returns_bridge_gaps() {
        let store = StoreBuilder::new()
            .instrument("AAA", vec![bar(1, 10.0), bar(2, 11.0), bar(4, 12.1)])
            .instrument("BBB", vec![bar(3, 5.0)])
            .build()
            .unwrap();
        let r = store.instrument("AAA").unwrap().close_returns();
        assert_eq!(r[0], None);
        assert!((r[1].unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(r[2], None);
        assert!((r[3].unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn move_across_gap_compounds_to_full_return() {
        let store = StoreBuilder::new()
            .instrument("AAA", vec![bar(1, 100.0), bar(2, 100.0), bar(4, 110.0), bar(5, 110.0)])
            .instrument("BBB", vec![bar(3, 50.0)])
            .build()
            .unwrap();
        let total = store
            .instrument("AAA")
            .unwrap()
            .close_returns()
            .iter()
            .flatten()
            .fold(1.0, |acc, r| acc * (1.0 + r))
            - 1.0;
        assert!((total - 0.1).abs() < 1e-12, "got {total}");
    }

    #[test]
    fn index_lookups() {
        let store = StoreBuilder::new()
            .instrument("AAA", vec![bar(2, 10.0), bar(4, 10.0), bar(6, 10.0)])
            .build()
            .unwrap();
        assert_eq!(store.index_of(d(4)), Some(1));
        assert_eq!(store.index_of(d(5)), None);
        assert_eq!(store.index_on_or_after(d(3)), Some(1));
        assert_eq!(store.index_on_or_after(d(7)), None);
        assert_eq!(store.index_on_or_before(d(5)), Some(1));
        assert_eq!(store.index_on_or_before(d(1)), None);
    }

    #[test]
    fn truncated_to_drops_later_dates() {
        let store = StoreBuilder::new()
            .instrument("AAA", vec![bar(1, 10.0), bar(2, 11.0), bar(3, 12.0)])
            .build()
            .unwrap();
        let cut = store.truncated_to(d(2));
        assert_eq!(cut.len(), 2);
        assert_eq!(cut.instrument("AAA").unwrap().close, vec![Some(10.0), Some(11.0)]);
        assert_eq!(cut.index_of(d(3)), None);
    }

    #[test]
    fn misaligned_series_are_rejected() {
        let inst = InstrumentSeries {
            ticker: "AAA".into(),
            open: vec![Some(1.0)],
            high: vec![Some(1.0)],
            low: vec![Some(1.0)],
            close: vec![Some(1.0), Some(1.0)],
            volume: vec![Some(1.0)],
            nav: None,
            benchmark: None,
        };
        assert!(TimeSeriesStore::new(vec![d(1)], vec![inst], vec![]).is_err());
    }
}
