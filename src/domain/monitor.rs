//! Daily monitoring run.

use crate::domain::action::{Action, ActionMapper, Recommendation, rationale};
use crate::domain::composite::CompositeScorer;
use crate::domain::config::DislocationConfig;
use crate::domain::signal::SignalComputer;
use crate::domain::store::TimeSeriesStore;
use std::cmp::Ordering;
use tracing::info;

/// One recommendation per instrument at the last store date, cheapest first.
/// Instruments without a defined score sort last; ties go by ticker.
pub fn run_monitor(store: &TimeSeriesStore, config: &DislocationConfig) -> Vec<Recommendation> {
    let signals = SignalComputer::new(config).compute(store);
    let scores = CompositeScorer::new(&config.weights).score_table(&signals, &store.tickers());
    let mapper = ActionMapper::new(&config.actions, &config.risk);

    let mut recommendations: Vec<Recommendation> = store
        .tickers()
        .into_iter()
        .map(|ticker| {
            let score = scores.latest(&ticker);
            let action = mapper.action(score);
            let readings: Vec<_> = signals
                .readings_for(&ticker)
                .into_iter()
                .map(|(kind, reading)| (kind, reading.clone()))
                .collect();
            let rationale = rationale(&ticker, action, score, &readings);
            Recommendation {
                ticker,
                action,
                score,
                signals: readings,
                rationale,
            }
        })
        .collect();

    recommendations.sort_by(|a, b| {
        match (a.score, b.score) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| a.ticker.cmp(&b.ticker))
    });

    if let Some(as_of) = store.dates().last() {
        info!(
            as_of = %as_of,
            instruments = recommendations.len(),
            buys = recommendations
                .iter()
                .filter(|r| r.action == Action::Buy)
                .count(),
            "monitor complete"
        );
    }
    recommendations
}
