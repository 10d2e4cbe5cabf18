//! Performance metrics over a simulated equity curve.

const PERIODS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub cagr: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Worst peak-to-trough decline, as a non-positive fraction.
    pub max_drawdown: f64,
    /// Longest run of periods spent below the previous peak.
    pub max_drawdown_duration: usize,
    pub calmar_ratio: f64,
    pub mean_turnover: f64,
    pub avg_gross_exposure: f64,
}

impl Metrics {
    pub fn compute(
        equity_curve: &[f64],
        turnover: &[f64],
        gross_exposure: &[f64],
        risk_free_rate: f64,
    ) -> Self {
        let initial = equity_curve.first().copied().unwrap_or(1.0);
        let final_equity = equity_curve.last().copied().unwrap_or(initial);

        let total_return = if initial > 0.0 {
            final_equity / initial - 1.0
        } else {
            0.0
        };

        let periods = equity_curve.len().saturating_sub(1);
        let cagr = compute_cagr(initial, final_equity, periods);

        let returns = period_returns(equity_curve);
        let period_rf = risk_free_rate / PERIODS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio, volatility) = compute_risk_adjusted(&returns, period_rf);

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);
        let calmar_ratio = if max_drawdown < 0.0 {
            cagr / max_drawdown.abs()
        } else {
            0.0
        };

        Metrics {
            total_return,
            cagr,
            volatility,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            calmar_ratio,
            mean_turnover: mean(turnover),
            avg_gross_exposure: mean(gross_exposure),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn compute_cagr(initial: f64, final_equity: f64, periods: usize) -> f64 {
    if periods == 0 || initial <= 0.0 {
        return 0.0;
    }
    let growth = final_equity / initial;
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(PERIODS_PER_YEAR / periods as f64) - 1.0
}

fn period_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

fn compute_drawdown(equity_curve: &[f64]) -> (f64, usize) {
    let Some(&first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut current_duration = 0usize;

    for &equity in equity_curve {
        if equity >= peak {
            peak = equity;
            current_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.min(equity / peak - 1.0);
            current_duration += 1;
            max_duration = max_duration.max(current_duration);
        }
    }

    (max_dd, max_duration)
}

/// Sharpe uses the sample deviation; Sortino's downside deviation averages
/// squared shortfalls over every period.
fn compute_risk_adjusted(returns: &[f64], period_rf: f64) -> (f64, f64, f64) {
    if returns.len() < 2 {
        return (0.0, 0.0, 0.0);
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();
    let excess = mean - period_rf;
    let annualizer = PERIODS_PER_YEAR.sqrt();

    let sharpe = if stddev > 1e-15 {
        excess / stddev * annualizer
    } else {
        0.0
    };

    let downside_variance = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum::<f64>()
        / n;
    let downside = downside_variance.sqrt();
    let sortino = if downside > 1e-15 {
        excess / downside * annualizer
    } else {
        0.0
    };

    (sharpe, sortino, stddev * annualizer)
}
