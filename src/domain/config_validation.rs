//! Configuration validation.
//!
//! Two passes: [`validate_known_keys`] runs against the raw source so typos
//! surface before anything is parsed, and [`validate_config`] checks the
//! parsed values before any run starts.

use crate::domain::config::DislocationConfig;
use crate::domain::error::DislocationError;
use crate::domain::universe::exclude_matcher;
use crate::ports::config_port::ConfigPort;

const KNOWN_KEYS: &[(&str, &[&str])] = &[
    (
        "windows",
        &[
            "premdisc",
            "volume",
            "range",
            "divergence",
            "divergence_return",
            "cross_asset",
        ],
    ),
    (
        "thresholds",
        &[
            "premdisc_z",
            "volume_z",
            "range_z",
            "divergence_z",
            "cross_asset_z",
            "oas_jump_bps",
        ],
    ),
    (
        "weights",
        &["premdisc", "volume", "divergence", "cross_asset", "renormalize"],
    ),
    ("composite_to_action", &["buy", "neutral", "sell"]),
    (
        "risk",
        &[
            "max_weight",
            "max_gross_exposure",
            "max_net_exposure",
            "full_weight_score",
            "allow_short",
        ],
    ),
    ("execution", &["use_next_open"]),
    ("costs", &["tx_bps", "slippage_bps"]),
    ("backtest", &["risk_free_rate", "start_date", "end_date"]),
    (
        "data",
        &["lookback_days", "max_lookback_days", "nav_proxy", "dir"],
    ),
    ("universe", &["file", "profile", "exclude", "allowlist"]),
    ("macro", &["series"]),
    ("reporting", &["out_dir"]),
];

/// Sections whose keys are user-chosen names.
const OPEN_SECTIONS: &[&str] = &["universe_files"];

pub fn validate_known_keys(config: &dyn ConfigPort) -> Result<(), DislocationError> {
    for section in config.sections() {
        if OPEN_SECTIONS.contains(&section.as_str()) {
            continue;
        }
        let keys = config.keys(&section);
        let known = KNOWN_KEYS
            .iter()
            .find(|(name, _)| *name == section)
            .map(|(_, keys)| *keys);
        match known {
            Some(known) => {
                if let Some(key) = keys.iter().find(|k| !known.contains(&k.as_str())) {
                    return Err(DislocationError::ConfigUnknown {
                        section,
                        key: key.clone(),
                    });
                }
            }
            // Keys above the first header land in an implicit section.
            None => {
                if let Some(key) = keys.first() {
                    return Err(DislocationError::ConfigUnknown {
                        section,
                        key: key.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

pub fn validate_config(config: &DislocationConfig) -> Result<(), DislocationError> {
    validate_windows(config)?;
    validate_thresholds(config)?;
    validate_weights(config)?;
    validate_action_thresholds(config)?;
    validate_risk(config)?;
    validate_costs(config)?;
    validate_backtest(config)?;
    validate_data(config)?;
    validate_universe(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> DislocationError {
    DislocationError::config_invalid(section, key, reason)
}

fn validate_windows(config: &DislocationConfig) -> Result<(), DislocationError> {
    let w = &config.windows;
    for (key, value) in [
        ("premdisc", w.premdisc),
        ("volume", w.volume),
        ("range", w.range),
        ("divergence", w.divergence),
        ("cross_asset", w.cross_asset),
    ] {
        if value < 2 {
            return Err(invalid("windows", key, "window must be at least 2"));
        }
    }
    if w.divergence_return < 1 {
        return Err(invalid(
            "windows",
            "divergence_return",
            "divergence_return must be at least 1",
        ));
    }
    Ok(())
}

fn validate_thresholds(config: &DislocationConfig) -> Result<(), DislocationError> {
    let t = &config.thresholds;
    for (key, value) in [
        ("premdisc_z", t.premdisc_z),
        ("volume_z", t.volume_z),
        ("range_z", t.range_z),
        ("divergence_z", t.divergence_z),
        ("cross_asset_z", t.cross_asset_z),
    ] {
        if !(value > 0.0) || !value.is_finite() {
            return Err(invalid("thresholds", key, "threshold must be positive"));
        }
    }
    if !(t.oas_jump_bps >= 0.0) {
        return Err(invalid(
            "thresholds",
            "oas_jump_bps",
            "oas_jump_bps must be non-negative",
        ));
    }
    Ok(())
}

fn validate_weights(config: &DislocationConfig) -> Result<(), DislocationError> {
    let w = &config.weights;
    for (key, value) in [
        ("premdisc", w.premdisc),
        ("volume", w.volume),
        ("divergence", w.divergence),
        ("cross_asset", w.cross_asset),
    ] {
        if !(value >= 0.0) || !value.is_finite() {
            return Err(invalid("weights", key, "weight must be non-negative"));
        }
    }
    Ok(())
}

fn validate_action_thresholds(config: &DislocationConfig) -> Result<(), DislocationError> {
    let a = &config.actions;
    if !(a.buy < a.sell) {
        return Err(invalid(
            "composite_to_action",
            "buy",
            "buy threshold must be below sell threshold",
        ));
    }
    if !(a.neutral >= 0.0) {
        return Err(invalid(
            "composite_to_action",
            "neutral",
            "neutral band must be non-negative",
        ));
    }
    if !(-a.neutral > a.buy && a.neutral < a.sell) {
        return Err(invalid(
            "composite_to_action",
            "neutral",
            "neutral band must lie strictly between buy and sell",
        ));
    }
    Ok(())
}

fn validate_risk(config: &DislocationConfig) -> Result<(), DislocationError> {
    let r = &config.risk;
    if !(r.max_weight > 0.0 && r.max_weight <= 1.0) {
        return Err(invalid(
            "risk",
            "max_weight",
            "max_weight must be in (0, 1]",
        ));
    }
    if !(r.max_gross_exposure > 0.0) {
        return Err(invalid(
            "risk",
            "max_gross_exposure",
            "max_gross_exposure must be positive",
        ));
    }
    if !(r.max_net_exposure > 0.0) {
        return Err(invalid(
            "risk",
            "max_net_exposure",
            "max_net_exposure must be positive",
        ));
    }
    if !(r.full_weight_score > 0.0) {
        return Err(invalid(
            "risk",
            "full_weight_score",
            "full_weight_score must be positive",
        ));
    }
    Ok(())
}

fn validate_costs(config: &DislocationConfig) -> Result<(), DislocationError> {
    if !(config.costs.tx_bps >= 0.0) {
        return Err(invalid("costs", "tx_bps", "tx_bps must be non-negative"));
    }
    if !(config.costs.slippage_bps >= 0.0) {
        return Err(invalid(
            "costs",
            "slippage_bps",
            "slippage_bps must be non-negative",
        ));
    }
    Ok(())
}

fn validate_backtest(config: &DislocationConfig) -> Result<(), DislocationError> {
    let b = &config.backtest;
    if !(0.0..1.0).contains(&b.risk_free_rate) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    if let (Some(start), Some(end)) = (b.start_date, b.end_date) {
        if start >= end {
            return Err(invalid(
                "backtest",
                "start_date",
                "start_date must be before end_date",
            ));
        }
    }
    Ok(())
}

fn validate_data(config: &DislocationConfig) -> Result<(), DislocationError> {
    let d = &config.data;
    if d.lookback_days <= 0 {
        return Err(invalid(
            "data",
            "lookback_days",
            "lookback_days must be positive",
        ));
    }
    if d.max_lookback_days < d.lookback_days {
        return Err(invalid(
            "data",
            "max_lookback_days",
            "max_lookback_days must be at least lookback_days",
        ));
    }
    Ok(())
}

fn validate_universe(config: &DislocationConfig) -> Result<(), DislocationError> {
    let u = &config.universe;
    if let Some(profile) = &u.profile {
        if !u.files.contains_key(profile) {
            return Err(invalid(
                "universe",
                "profile",
                "profile must name an entry in [universe_files]",
            ));
        }
    }
    exclude_matcher(u)?;
    Ok(())
}
