//! Builds a [`TimeSeriesStore`] from the provider ports.
//!
//! Data is fetched once per attempt from `start - lookback_days` to `end`.
//! When the first requested date cannot seed every signal, the lookback is
//! doubled (capped at `max_lookback_days`) and the fetch repeated. The run
//! fails with `InsufficientHistory` once the cap is reached or a wider fetch
//! brings no new dates.

use crate::domain::config::DislocationConfig;
use crate::domain::error::DislocationError;
use crate::domain::ohlcv::DatedValue;
use crate::domain::signal::SignalComputer;
use crate::domain::store::{StoreBuilder, TimeSeriesStore};
use crate::domain::universe::Universe;
use crate::ports::data_port::{MacroProvider, NavProvider, PriceProvider};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeSet;
use tracing::{info, warn};

pub struct DataSources<'a> {
    pub prices: &'a dyn PriceProvider,
    pub navs: &'a dyn NavProvider,
    pub macros: &'a dyn MacroProvider,
}

pub fn load_store(
    sources: &DataSources<'_>,
    universe: &Universe,
    config: &DislocationConfig,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<TimeSeriesStore, DislocationError> {
    if universe.is_empty() {
        return Err(DislocationError::missing_data("universe", "no tickers after filtering"));
    }

    let required = SignalComputer::new(config).required_history(!config.macros.series.is_empty());
    let mut lookback = config.data.lookback_days;
    let mut previous_len = None;

    loop {
        let fetch_start = start - Duration::days(lookback);
        let store = fetch_once(sources, universe, config, fetch_start, end)?;

        let start_idx = store.index_on_or_after(start).ok_or_else(|| {
            DislocationError::missing_data("universe", format!("no trading dates on or after {start}"))
        })?;
        let available = start_idx + 1;
        if available >= required {
            info!(
                from = %fetch_start,
                to = %end,
                dates = store.len(),
                instruments = store.instruments().len(),
                lookback_days = lookback,
                "store loaded"
            );
            return Ok(store);
        }

        let stalled = previous_len == Some(store.len());
        if lookback >= config.data.max_lookback_days || stalled {
            return Err(DislocationError::InsufficientHistory {
                ticker: "universe".to_string(),
                date: store.dates()[start_idx],
                available,
                required,
            });
        }

        previous_len = Some(store.len());
        let extended = (lookback * 2).min(config.data.max_lookback_days);
        warn!(
            available,
            required,
            from_days = lookback,
            to_days = extended,
            "extending lookback buffer"
        );
        lookback = extended;
    }
}

fn fetch_once(
    sources: &DataSources<'_>,
    universe: &Universe,
    config: &DislocationConfig,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<TimeSeriesStore, DislocationError> {
    let tickers = universe.tickers();
    let benchmark_map = universe.benchmark_map();

    let mut wanted: BTreeSet<String> = tickers.iter().cloned().collect();
    wanted.extend(benchmark_map.values().cloned());
    let wanted: Vec<String> = wanted.into_iter().collect();

    let fetched = sources.prices.fetch_prices(&wanted, start, end);
    let closes = |ticker: &str| -> Option<Vec<DatedValue>> {
        fetched.iter().find(|(t, _)| t == ticker).map(|(_, bars)| {
            bars.iter()
                .map(|b| DatedValue::new(b.date, b.close))
                .collect()
        })
    };

    let mut builder = StoreBuilder::new().nav_proxy(config.data.nav_proxy);
    let mut loaded = 0;
    for ticker in &tickers {
        let Some((_, bars)) = fetched.iter().find(|(t, _)| t == ticker) else {
            warn!(ticker = %ticker, "no price data, skipping");
            continue;
        };
        builder = builder.instrument(ticker, bars.clone());
        loaded += 1;

        if let Some(nav) = sources.navs.fetch_nav(ticker, start, end) {
            builder = builder.nav(ticker, nav);
        }
        if let Some(proxy) = benchmark_map.get(ticker) {
            match closes(proxy) {
                Some(values) => builder = builder.benchmark(ticker, values),
                None => warn!(ticker = %ticker, proxy = %proxy, "benchmark proxy has no data"),
            }
        }
    }
    if loaded == 0 {
        return Err(DislocationError::missing_data("universe", "no price data for any ticker"));
    }

    for (id, kind) in &config.macros.series {
        let values = sources.macros.fetch_macro(id, start, end);
        if values.is_empty() {
            return Err(DislocationError::missing_data(id, "configured macro series is empty"));
        }
        builder = builder.macro_series(id, *kind, values);
    }

    let store = builder.build()?;
    if store.instruments().iter().all(|s| s.valid_closes() == 0) {
        return Err(DislocationError::missing_data("universe", "all closes are missing"));
    }
    Ok(store)
}
