//! Vectorized backtest.
//!
//! Signals, scores and target weights are computed for the whole store in
//! one pass; the simulation then walks the `[start, end]` rows once:
//!
//! - position(t) = weight(t) with close execution, weight(t-1) with next-open
//! - gross(t)    = sum_i position_i(t-1) * r_i(t), missing r counts as 0
//! - turnover(t) = sum_i |weight_i(t) - weight_i(t-1)|, weight(-1) = 0
//! - net(t)      = gross(t) - sum_i |position_i(t-1) - position_i(t-2)| * cost
//! - equity(0)   = 1, equity(t) = equity(t-1) * (1 + net(t))

use crate::domain::action::{ActionMapper, WeightTable};
use crate::domain::composite::{CompositeScorer, ScoreTable};
use crate::domain::config::DislocationConfig;
use crate::domain::config_validation::validate_config;
use crate::domain::error::DislocationError;
use crate::domain::metrics::Metrics;
use crate::domain::signal::SignalComputer;
use crate::domain::store::TimeSeriesStore;
use chrono::NaiveDate;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub dates: Vec<NaiveDate>,
    pub equity_curve: Vec<f64>,
    pub gross_returns: Vec<f64>,
    pub net_returns: Vec<f64>,
    pub turnover: Vec<f64>,
    /// Target weights per date.
    pub weights: WeightTable,
    /// Weights actually earning returns after execution timing.
    pub positions: Vec<Vec<f64>>,
    /// Composite scores over the same dates.
    pub scores: ScoreTable,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub positions: Vec<Vec<f64>>,
    pub gross_returns: Vec<f64>,
    pub net_returns: Vec<f64>,
    pub turnover: Vec<f64>,
    pub gross_exposure: Vec<f64>,
    pub equity_curve: Vec<f64>,
}

/// Runs the portfolio over pre-computed weight and return rows.
///
/// `weights[t]` and `returns[t]` share the same instrument order. The
/// portfolio is flat before row 0.
pub fn simulate(
    weights: &[Vec<f64>],
    returns: &[Vec<f64>],
    use_next_open: bool,
    cost_rate: f64,
) -> Simulation {
    let n = weights.len();
    let width = weights.first().map_or(0, |row| row.len());
    let flat = vec![0.0; width];

    let positions: Vec<Vec<f64>> = (0..n)
        .map(|t| {
            if !use_next_open {
                weights[t].clone()
            } else if t == 0 {
                flat.clone()
            } else {
                weights[t - 1].clone()
            }
        })
        .collect();

    let mut gross_returns = Vec::with_capacity(n);
    let mut net_returns = Vec::with_capacity(n);
    let mut turnover = Vec::with_capacity(n);
    let mut gross_exposure = Vec::with_capacity(n);
    let mut equity_curve = Vec::with_capacity(n);
    let mut equity = 1.0;

    for t in 0..n {
        let prev_weight = if t >= 1 { &weights[t - 1] } else { &flat };
        let held = if t >= 1 { &positions[t - 1] } else { &flat };
        let held_before = if t >= 2 { &positions[t - 2] } else { &flat };

        let gross: f64 = held
            .iter()
            .zip(&returns[t])
            .map(|(p, r)| if r.is_finite() { p * r } else { 0.0 })
            .sum();
        let traded: f64 = held
            .iter()
            .zip(held_before)
            .map(|(a, b)| (a - b).abs())
            .sum();
        let net = gross - traded * cost_rate;

        if t > 0 {
            equity *= 1.0 + net;
        }

        gross_returns.push(gross);
        net_returns.push(net);
        turnover.push(
            weights[t]
                .iter()
                .zip(prev_weight)
                .map(|(a, b)| (a - b).abs())
                .sum(),
        );
        gross_exposure.push(positions[t].iter().map(|p| p.abs()).sum());
        equity_curve.push(equity);
    }

    Simulation {
        positions,
        gross_returns,
        net_returns,
        turnover,
        gross_exposure,
        equity_curve,
    }
}

/// Checks that the store can seed every signal on `start`.
pub fn check_history(
    store: &TimeSeriesStore,
    config: &DislocationConfig,
    start: NaiveDate,
) -> Result<usize, DislocationError> {
    if store.instruments().is_empty() {
        return Err(DislocationError::missing_data("universe", "no instruments in store"));
    }
    if store.instruments().iter().all(|s| s.valid_closes() == 0) {
        return Err(DislocationError::missing_data("universe", "no price data for any instrument"));
    }
    let start_idx = store.index_on_or_after(start).ok_or_else(|| {
        DislocationError::missing_data("universe", format!("no trading dates on or after {start}"))
    })?;
    let required =
        SignalComputer::new(config).required_history(!store.macros().is_empty());
    if start_idx + 1 < required {
        return Err(DislocationError::InsufficientHistory {
            ticker: "universe".to_string(),
            date: store.dates()[start_idx],
            available: start_idx + 1,
            required,
        });
    }
    Ok(start_idx)
}

pub fn run_backtest(
    store: &TimeSeriesStore,
    config: &DislocationConfig,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BacktestResult, DislocationError> {
    validate_config(config)?;
    let start_idx = check_history(store, config, start)?;
    let end_idx = store
        .index_on_or_before(end)
        .filter(|e| *e >= start_idx)
        .ok_or_else(|| {
            DislocationError::missing_data(
                "universe",
                format!("no trading dates between {start} and {end}"),
            )
        })?;

    let signals = SignalComputer::new(config).compute(store);
    let tickers = store.tickers();
    let all_scores = CompositeScorer::new(&config.weights).score_table(&signals, &tickers);
    let mapper = ActionMapper::new(&config.actions, &config.risk);
    let weights = mapper.target_weights(&all_scores, start_idx, end_idx);

    let instrument_returns: Vec<Vec<Option<f64>>> = weights
        .tickers
        .iter()
        .map(|ticker| {
            store
                .instrument(ticker)
                .map(|s| s.close_returns())
                .unwrap_or_else(|| vec![None; store.len()])
        })
        .collect();
    let returns: Vec<Vec<f64>> = (start_idx..=end_idx)
        .map(|t| {
            instrument_returns
                .iter()
                .map(|r| r[t].unwrap_or(0.0))
                .collect()
        })
        .collect();

    debug!(
        instruments = tickers.len(),
        rows = weights.rows.len(),
        use_next_open = config.execution.use_next_open,
        "simulating"
    );
    let sim = simulate(
        &weights.rows,
        &returns,
        config.execution.use_next_open,
        config.costs.rate(),
    );

    let metrics = Metrics::compute(
        &sim.equity_curve,
        &sim.turnover,
        &sim.gross_exposure,
        config.backtest.risk_free_rate,
    );
    info!(
        start = %weights.dates[0],
        end = %weights.dates[weights.dates.len() - 1],
        periods = weights.rows.len(),
        total_return = metrics.total_return,
        sharpe = metrics.sharpe_ratio,
        max_drawdown = metrics.max_drawdown,
        "backtest complete"
    );

    let scores = ScoreTable {
        dates: weights.dates.clone(),
        columns: all_scores
            .columns
            .into_iter()
            .map(|(ticker, column)| (ticker, column[start_idx..=end_idx].to_vec()))
            .collect(),
    };

    Ok(BacktestResult {
        dates: weights.dates.clone(),
        equity_curve: sim.equity_curve,
        gross_returns: sim.gross_returns,
        net_returns: sim.net_returns,
        turnover: sim.turnover,
        positions: sim.positions,
        weights,
        scores,
        metrics,
    })
}
