//! Run configuration.
//!
//! [`DislocationConfig`] is an immutable value built once from a
//! [`ConfigPort`] and passed explicitly into every entry point. Every key has
//! a default; keys the crate does not know are rejected before any data is
//! fetched.

use crate::domain::config_validation::{validate_config, validate_known_keys};
use crate::domain::error::DislocationError;
use crate::domain::store::MacroKind;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    pub premdisc: usize,
    pub volume: usize,
    pub range: usize,
    pub divergence: usize,
    /// Lookback of the instrument-vs-benchmark return feeding the divergence z-score.
    pub divergence_return: usize,
    pub cross_asset: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            premdisc: 126,
            volume: 20,
            range: 60,
            divergence: 126,
            divergence_return: 20,
            cross_asset: 126,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdConfig {
    pub premdisc_z: f64,
    pub volume_z: f64,
    pub range_z: f64,
    pub divergence_z: f64,
    pub cross_asset_z: f64,
    pub oas_jump_bps: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        ThresholdConfig {
            premdisc_z: 2.0,
            volume_z: 2.0,
            range_z: 2.0,
            divergence_z: 2.0,
            cross_asset_z: 2.0,
            oas_jump_bps: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightConfig {
    pub premdisc: f64,
    pub volume: f64,
    pub divergence: f64,
    pub cross_asset: f64,
    /// Rescale directional weights over the directional signals present.
    pub renormalize: bool,
}

impl Default for WeightConfig {
    fn default() -> Self {
        WeightConfig {
            premdisc: 0.35,
            volume: 0.25,
            divergence: 0.30,
            cross_asset: 0.10,
            renormalize: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionThresholds {
    pub buy: f64,
    pub neutral: f64,
    pub sell: f64,
}

impl Default for ActionThresholds {
    fn default() -> Self {
        ActionThresholds {
            buy: -0.8,
            neutral: 0.2,
            sell: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub max_weight: f64,
    pub max_gross_exposure: f64,
    pub max_net_exposure: f64,
    /// |score| at which a new position reaches `max_weight`.
    pub full_weight_score: f64,
    pub allow_short: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            max_weight: 0.08,
            max_gross_exposure: 0.40,
            max_net_exposure: 0.40,
            full_weight_score: 2.0,
            allow_short: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub use_next_open: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            use_next_open: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostConfig {
    pub tx_bps: f64,
    pub slippage_bps: f64,
}

impl CostConfig {
    /// Cost per unit of traded weight.
    pub fn rate(&self) -> f64 {
        (self.tx_bps + self.slippage_bps) / 10_000.0
    }
}

impl Default for CostConfig {
    fn default() -> Self {
        CostConfig {
            tx_bps: 2.0,
            slippage_bps: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    /// Calendar days fetched before the start date to seed rolling windows.
    pub lookback_days: i64,
    /// Upper bound for the lookback once extended.
    pub max_lookback_days: i64,
    pub nav_proxy: bool,
    /// Directory read by the CSV data adapter.
    pub dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            lookback_days: 200,
            max_lookback_days: 1_000,
            nav_proxy: true,
            dir: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BacktestSettings {
    /// Annual rate used for excess returns.
    pub risk_free_rate: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UniverseConfig {
    pub file: Option<String>,
    /// Selects one of `files`; `[universe] file` takes precedence.
    pub profile: Option<String>,
    /// Named universe files from `[universe_files]`, keyed by lowercase name.
    pub files: BTreeMap<String, String>,
    /// Case-insensitive regexes; a matching ticker is dropped unless allowlisted.
    pub exclude: Vec<String>,
    pub allowlist: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MacroConfig {
    pub series: Vec<(String, MacroKind)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportingConfig {
    pub out_dir: String,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        ReportingConfig {
            out_dir: "reports".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DislocationConfig {
    pub windows: WindowConfig,
    pub thresholds: ThresholdConfig,
    pub weights: WeightConfig,
    pub actions: ActionThresholds,
    pub risk: RiskConfig,
    pub execution: ExecutionConfig,
    pub costs: CostConfig,
    pub data: DataConfig,
    pub backtest: BacktestSettings,
    pub universe: UniverseConfig,
    pub macros: MacroConfig,
    pub reporting: ReportingConfig,
}

impl DislocationConfig {
    pub fn from_port(port: &dyn ConfigPort) -> Result<Self, DislocationError> {
        validate_known_keys(port)?;

        let w = WindowConfig::default();
        let windows = WindowConfig {
            premdisc: read(port, "windows", "premdisc", w.premdisc)?,
            volume: read(port, "windows", "volume", w.volume)?,
            range: read(port, "windows", "range", w.range)?,
            divergence: read(port, "windows", "divergence", w.divergence)?,
            divergence_return: read(port, "windows", "divergence_return", w.divergence_return)?,
            cross_asset: read(port, "windows", "cross_asset", w.cross_asset)?,
        };

        let t = ThresholdConfig::default();
        let thresholds = ThresholdConfig {
            premdisc_z: read(port, "thresholds", "premdisc_z", t.premdisc_z)?,
            volume_z: read(port, "thresholds", "volume_z", t.volume_z)?,
            range_z: read(port, "thresholds", "range_z", t.range_z)?,
            divergence_z: read(port, "thresholds", "divergence_z", t.divergence_z)?,
            cross_asset_z: read(port, "thresholds", "cross_asset_z", t.cross_asset_z)?,
            oas_jump_bps: read(port, "thresholds", "oas_jump_bps", t.oas_jump_bps)?,
        };

        let wt = WeightConfig::default();
        let weights = WeightConfig {
            premdisc: read(port, "weights", "premdisc", wt.premdisc)?,
            volume: read(port, "weights", "volume", wt.volume)?,
            divergence: read(port, "weights", "divergence", wt.divergence)?,
            cross_asset: read(port, "weights", "cross_asset", wt.cross_asset)?,
            renormalize: read_bool(port, "weights", "renormalize", wt.renormalize)?,
        };

        let a = ActionThresholds::default();
        let actions = ActionThresholds {
            buy: read(port, "composite_to_action", "buy", a.buy)?,
            neutral: read(port, "composite_to_action", "neutral", a.neutral)?,
            sell: read(port, "composite_to_action", "sell", a.sell)?,
        };

        let r = RiskConfig::default();
        let risk = RiskConfig {
            max_weight: read(port, "risk", "max_weight", r.max_weight)?,
            max_gross_exposure: read(port, "risk", "max_gross_exposure", r.max_gross_exposure)?,
            max_net_exposure: read(port, "risk", "max_net_exposure", r.max_net_exposure)?,
            full_weight_score: read(port, "risk", "full_weight_score", r.full_weight_score)?,
            allow_short: read_bool(port, "risk", "allow_short", r.allow_short)?,
        };

        let execution = ExecutionConfig {
            use_next_open: read_bool(
                port,
                "execution",
                "use_next_open",
                ExecutionConfig::default().use_next_open,
            )?,
        };

        let c = CostConfig::default();
        let costs = CostConfig {
            tx_bps: read(port, "costs", "tx_bps", c.tx_bps)?,
            slippage_bps: read(port, "costs", "slippage_bps", c.slippage_bps)?,
        };

        let d = DataConfig::default();
        let data = DataConfig {
            lookback_days: read(port, "data", "lookback_days", d.lookback_days)?,
            max_lookback_days: read(port, "data", "max_lookback_days", d.max_lookback_days)?,
            nav_proxy: read_bool(port, "data", "nav_proxy", d.nav_proxy)?,
            dir: port.get_string("data", "dir").unwrap_or(d.dir),
        };

        let backtest = BacktestSettings {
            risk_free_rate: read(port, "backtest", "risk_free_rate", 0.0)?,
            start_date: read_date(port, "backtest", "start_date")?,
            end_date: read_date(port, "backtest", "end_date")?,
        };

        let universe = UniverseConfig {
            file: port.get_string("universe", "file").map(|f| f.trim().to_string()),
            profile: port
                .get_string("universe", "profile")
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty()),
            files: port
                .keys("universe_files")
                .into_iter()
                .filter_map(|name| {
                    port.get_string("universe_files", &name)
                        .map(|path| (name.to_lowercase(), path.trim().to_string()))
                })
                .collect(),
            exclude: read_list(port, "universe", "exclude"),
            allowlist: read_list(port, "universe", "allowlist")
                .into_iter()
                .map(|t| t.to_uppercase())
                .collect(),
        };

        let macros = MacroConfig {
            series: read_list(port, "macro", "series")
                .iter()
                .map(|entry| parse_macro_entry(entry))
                .collect::<Result<_, _>>()?,
        };

        let reporting = ReportingConfig {
            out_dir: port
                .get_string("reporting", "out_dir")
                .unwrap_or_else(|| ReportingConfig::default().out_dir),
        };

        let config = DislocationConfig {
            windows,
            thresholds,
            weights,
            actions,
            risk,
            execution,
            costs,
            data,
            backtest,
            universe,
            macros,
            reporting,
        };
        validate_config(&config)?;
        Ok(config)
    }
}

fn read<T: FromStr>(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, DislocationError> {
    match port.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            DislocationError::config_invalid(section, key, format!("cannot parse '{}'", raw.trim()))
        }),
    }
}

fn read_bool(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, DislocationError> {
    match port.get_string(section, key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            other => Err(DislocationError::config_invalid(
                section,
                key,
                format!("expected a boolean, got '{other}'"),
            )),
        },
    }
}

fn read_date(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, DislocationError> {
    port.get_string(section, key)
        .map(|raw| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
                DislocationError::config_invalid(
                    section,
                    key,
                    format!("invalid {key} format, expected YYYY-MM-DD"),
                )
            })
        })
        .transpose()
}

fn read_list(port: &dyn ConfigPort, section: &str, key: &str) -> Vec<String> {
    port.get_string(section, key)
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// `ID:kind` where kind is `volatility` or `credit_spread`. Without a kind,
/// ids mentioning OAS are treated as credit spreads.
fn parse_macro_entry(entry: &str) -> Result<(String, MacroKind), DislocationError> {
    let (id, kind) = match entry.split_once(':') {
        Some((id, kind)) => (id.trim(), Some(kind.trim().to_lowercase())),
        None => (entry.trim(), None),
    };
    if id.is_empty() {
        return Err(DislocationError::config_invalid(
            "macro",
            "series",
            format!("empty series id in '{entry}'"),
        ));
    }
    let kind = match kind.as_deref() {
        Some("volatility") | Some("vol") => MacroKind::Volatility,
        Some("credit_spread") | Some("credit") | Some("oas") => MacroKind::CreditSpread,
        Some(other) => {
            return Err(DislocationError::config_invalid(
                "macro",
                "series",
                format!("unknown macro kind '{other}'"),
            ));
        }
        None if id.to_uppercase().contains("OAS") => MacroKind::CreditSpread,
        None => MacroKind::Volatility,
    };
    Ok((id.to_string(), kind))
}
