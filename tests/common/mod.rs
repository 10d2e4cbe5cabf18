#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use dislocator::domain::ohlcv::{DatedValue, OhlcvBar};
use dislocator::domain::store::{MacroKind, StoreBuilder, TimeSeriesStore};
use dislocator::ports::data_port::{MacroProvider, NavProvider, PriceProvider};
use std::collections::HashMap;
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

/// Synthetic history length in days.
pub const DAYS: usize = 300;

/// Days on which `A` trades at 0.9x NAV before snapping back.
pub const DISLOCATION: RangeInclusive<usize> = 250..=255;

pub fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + Duration::days(i as i64)
}

pub fn nav_level(base: f64, i: usize) -> f64 {
    base * (1.0 + 0.0004 * i as f64)
}

pub fn close_a(i: usize) -> f64 {
    let nav = nav_level(100.0, i);
    if DISLOCATION.contains(&i) {
        nav * 0.9
    } else {
        nav * (1.0 + 0.002 * (1.3 * i as f64).sin())
    }
}

pub fn close_b(i: usize) -> f64 {
    nav_level(50.0, i) * (1.0 + 0.002 * (0.8 * i as f64 + 1.0).sin())
}

pub fn close_benchmark(i: usize) -> f64 {
    nav_level(200.0, i) * (1.0 + 0.001 * (0.5 * i as f64).sin())
}

/// Bars around the given closes with small deterministic noise in range
/// and volume.
pub fn bars_from(closes: &[f64], phase: f64) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let x = i as f64;
            OhlcvBar {
                date: day(i),
                open: close * (1.0 - 0.001 * (0.3 * x + phase).sin()),
                high: close * (1.0 + 0.004 + 0.001 * (0.9 * x + phase).sin()),
                low: close * (1.0 - 0.004 - 0.001 * (1.1 * x + phase).cos()),
                close,
                volume: 1_000_000.0 * (1.0 + 0.2 * (0.7 * x + phase).sin()),
            }
        })
        .collect()
}

pub fn navs_from(base: f64, n: usize) -> Vec<DatedValue> {
    (0..n)
        .map(|i| DatedValue::new(day(i), nav_level(base, i)))
        .collect()
}

pub fn closes(f: fn(usize) -> f64, n: usize) -> Vec<f64> {
    (0..n).map(f).collect()
}

pub fn vix(n: usize) -> Vec<DatedValue> {
    (0..n)
        .map(|i| DatedValue::new(day(i), 15.0 + (0.4 * i as f64).sin()))
        .collect()
}

fn as_values(bars: &[OhlcvBar]) -> Vec<DatedValue> {
    bars.iter().map(|b| DatedValue::new(b.date, b.close)).collect()
}

/// Two instruments over [`DAYS`] days. Both carry a published NAV and the
/// shared `BMK` benchmark.
pub fn fixture_store() -> TimeSeriesStore {
    fixture_store_with(closes(close_a, DAYS), closes(close_b, DAYS))
}

pub fn fixture_store_with(a: Vec<f64>, b: Vec<f64>) -> TimeSeriesStore {
    let n = a.len();
    let bench = as_values(&bars_from(&closes(close_benchmark, n), 2.0));
    StoreBuilder::new()
        .instrument("A", bars_from(&a, 0.0))
        .nav("A", navs_from(100.0, n))
        .benchmark("A", bench.clone())
        .instrument("B", bars_from(&b, 1.0))
        .nav("B", navs_from(50.0, n))
        .benchmark("B", bench)
        .build()
        .unwrap()
}

pub fn fixture_store_with_macro() -> TimeSeriesStore {
    let bench = as_values(&bars_from(&closes(close_benchmark, DAYS), 2.0));
    StoreBuilder::new()
        .instrument("A", bars_from(&closes(close_a, DAYS), 0.0))
        .nav("A", navs_from(100.0, DAYS))
        .benchmark("A", bench)
        .macro_series("VIX", MacroKind::Volatility, vix(DAYS))
        .build()
        .unwrap()
}

/// In-memory provider serving the same fixture through the data ports.
pub struct MockProvider {
    pub prices: HashMap<String, Vec<OhlcvBar>>,
    pub navs: HashMap<String, Vec<DatedValue>>,
    pub macros: HashMap<String, Vec<DatedValue>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            prices: HashMap::new(),
            navs: HashMap::new(),
            macros: HashMap::new(),
        }
    }

    pub fn with_prices(mut self, ticker: &str, bars: Vec<OhlcvBar>) -> Self {
        self.prices.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_nav(mut self, ticker: &str, values: Vec<DatedValue>) -> Self {
        self.navs.insert(ticker.to_string(), values);
        self
    }

    pub fn with_macro(mut self, id: &str, values: Vec<DatedValue>) -> Self {
        self.macros.insert(id.to_string(), values);
        self
    }

    pub fn fixture() -> Self {
        Self::new()
            .with_prices("A", bars_from(&closes(close_a, DAYS), 0.0))
            .with_prices("B", bars_from(&closes(close_b, DAYS), 1.0))
            .with_prices("BMK", bars_from(&closes(close_benchmark, DAYS), 2.0))
            .with_nav("A", navs_from(100.0, DAYS))
            .with_nav("B", navs_from(50.0, DAYS))
    }
}

fn within<T: Clone>(
    items: &[T],
    date: impl Fn(&T) -> NaiveDate,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<T> {
    items
        .iter()
        .filter(|x| {
            let d = date(*x);
            d >= start && d <= end
        })
        .cloned()
        .collect()
}

impl PriceProvider for MockProvider {
    fn fetch_prices(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<(String, Vec<OhlcvBar>)> {
        tickers
            .iter()
            .filter_map(|t| {
                self.prices
                    .get(t)
                    .map(|bars| (t.clone(), within(bars, |b| b.date, start, end)))
            })
            .collect()
    }
}

impl NavProvider for MockProvider {
    fn fetch_nav(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Option<Vec<DatedValue>> {
        self.navs
            .get(ticker)
            .map(|values| within(values, |v| v.date, start, end))
    }
}

impl MacroProvider for MockProvider {
    fn fetch_macro(&self, series_id: &str, start: NaiveDate, end: NaiveDate) -> Vec<DatedValue> {
        self.macros
            .get(series_id)
            .map(|values| within(values, |v| v.date, start, end))
            .unwrap_or_default()
    }
}

fn write_bars(path: &Path, bars: &[OhlcvBar]) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        content.push_str(&format!(
            "{},{:.6},{:.6},{:.6},{:.6},{:.0}\n",
            b.date, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    fs::write(path, content).unwrap();
}

fn write_values(path: &Path, header: &str, values: &[DatedValue]) {
    let mut content = format!("date,{header}\n");
    for v in values {
        content.push_str(&format!("{},{:.6}\n", v.date, v.value));
    }
    fs::write(path, content).unwrap();
}

/// Writes the fixture in the CSV adapter layout plus a universe file
/// mapping both instruments to `BMK`.
pub fn write_csv_fixture(root: &Path) {
    let data = root.join("data");
    fs::create_dir_all(data.join("nav")).unwrap();
    fs::create_dir_all(data.join("macro")).unwrap();

    let provider = MockProvider::fixture();
    for (ticker, bars) in &provider.prices {
        write_bars(&data.join(format!("{ticker}.csv")), bars);
    }
    for (ticker, values) in &provider.navs {
        write_values(&data.join("nav").join(format!("{ticker}.csv")), "nav", values);
    }
    write_values(&data.join("macro").join("VIX.csv"), "value", &vix(DAYS));

    fs::write(
        root.join("universe.csv"),
        "ticker,benchmark_proxy\nA,BMK\nB,BMK\n",
    )
    .unwrap();
}

/// Minimal INI pointing at a fixture written by [`write_csv_fixture`].
pub fn fixture_ini(root: &Path) -> String {
    format!(
        "[data]\ndir = {}\n\n[universe]\nfile = {}\n\n[backtest]\nstart_date = {}\nend_date = {}\n",
        root.join("data").display(),
        root.join("universe.csv").display(),
        day(200),
        day(DAYS - 1),
    )
}
