//! Rolling-window statistics over gap-aware series.
//!
//! z(t) = (x[t] - mean(x[t-n..t])) / stddev(x[t-n..t])
//!
//! The baseline is the `n` observations strictly before `t`, with sample
//! (n - 1) standard deviation. A value is produced only when all `n + 1`
//! positions are present. A baseline whose deviation is numerically zero
//! yields `None`.

const DEGENERATE_STD: f64 = 1e-10;

/// Minimum number of consecutive observations needed for one z-score.
pub fn required_points(window: usize) -> usize {
    window + 1
}

pub fn rolling_zscore(raw: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(raw.len());
    for t in 0..raw.len() {
        out.push(zscore_at(raw, t, window));
    }
    out
}

pub fn zscore_at(raw: &[Option<f64>], t: usize, window: usize) -> Option<f64> {
    if window < 2 || t < window || t >= raw.len() {
        return None;
    }
    let current = raw[t]?;
    let baseline = &raw[t - window..t];

    let mut sum = 0.0;
    for v in baseline {
        sum += (*v)?;
    }
    let mean = sum / window as f64;

    let variance = baseline
        .iter()
        .flatten()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / (window - 1) as f64;
    let std = variance.sqrt();

    if !std.is_finite() || std <= DEGENERATE_STD * mean.abs().max(1.0) {
        return None;
    }
    Some((current - mean) / std)
}

/// Simple return over `lookback` positions: x[t] / x[t - lookback] - 1.
pub fn pct_change_over(values: &[Option<f64>], lookback: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|t| {
            if lookback == 0 || t < lookback {
                return None;
            }
            match (values[t - lookback], values[t]) {
                (Some(prev), Some(curr)) if prev > 0.0 => Some(curr / prev - 1.0),
                _ => None,
            }
        })
        .collect()
}

/// One-period difference x[t] - x[t-1].
pub fn diff(values: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|t| {
            if t == 0 {
                return None;
            }
            Some(values[t]? - values[t - 1]?)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|v| Some(*v)).collect()
    }

    #[test]
    fn zscore_warmup_needs_window_plus_one() {
        let raw = some(&[1.0, 2.0, 3.0, 4.0, 10.0]);
        let z = rolling_zscore(&raw, 3);

        assert!(z[0].is_none());
        assert!(z[1].is_none());
        assert!(z[2].is_none());
        assert!(z[3].is_some());
        assert!(z[4].is_some());
        assert_eq!(required_points(3), 4);
    }

    #[test]
    fn zscore_known_value() {
        // baseline [1, 2, 3]: mean 2, sample std 1
        let raw = some(&[1.0, 2.0, 3.0, 5.0]);
        let z = rolling_zscore(&raw, 3);
        assert_relative_eq!(z[3].unwrap(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn zscore_excludes_current_point_from_baseline() {
        // A baseline that included the spike could never exceed (n-1)/sqrt(n).
        let raw = some(&[1.0, 2.0, 1.0, 2.0, 1.0, 100.0]);
        let z = rolling_zscore(&raw, 5);
        assert!(z[5].unwrap() > 100.0);
    }

    #[test]
    fn zscore_constant_baseline_is_undefined() {
        let raw = some(&[100.0, 100.0, 100.0, 100.0, 150.0]);
        let z = rolling_zscore(&raw, 4);
        assert!(z[4].is_none());
    }

    #[test]
    fn zscore_constant_large_values_is_undefined() {
        let raw = some(&[1.0e6; 30]);
        let z = rolling_zscore(&raw, 20);
        assert!(z.iter().all(|v| v.is_none()));
    }

    #[test]
    fn zscore_gap_in_baseline_is_undefined() {
        let mut raw = some(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        raw[2] = None;
        let z = rolling_zscore(&raw, 3);
        assert!(z[3].is_none());
        assert!(z[4].is_none());
        assert!(z[5].is_none());
        assert!(z[6].is_some());
    }

    #[test]
    fn zscore_missing_current_is_undefined() {
        let mut raw = some(&[1.0, 2.0, 3.0, 4.0]);
        raw[3] = None;
        assert!(zscore_at(&raw, 3, 3).is_none());
    }

    #[test]
    fn zscore_window_below_two_is_undefined() {
        let raw = some(&[1.0, 2.0, 3.0]);
        assert!(rolling_zscore(&raw, 1).iter().all(|v| v.is_none()));
    }

    #[test]
    fn pct_change_over_lookback() {
        let values = some(&[100.0, 110.0, 121.0]);
        let r = pct_change_over(&values, 2);
        assert!(r[0].is_none());
        assert!(r[1].is_none());
        assert_relative_eq!(r[2].unwrap(), 0.21, epsilon = 1e-12);
    }

    #[test]
    fn pct_change_over_gap() {
        let values = vec![Some(100.0), None, Some(121.0)];
        let r = pct_change_over(&values, 1);
        assert!(r[1].is_none());
        assert!(r[2].is_none());
    }

    #[test]
    fn diff_basic() {
        let values = vec![Some(1.5), Some(1.65), None, Some(2.0)];
        let dv = diff(&values);
        assert!(dv[0].is_none());
        assert_relative_eq!(dv[1].unwrap(), 0.15, epsilon = 1e-12);
        assert!(dv[2].is_none());
        assert!(dv[3].is_none());
    }
}
