//! Instrument universe.
//!
//! Loaded from a CSV with a `ticker` column and an optional
//! `benchmark_proxy` column (header names are case-insensitive), then
//! narrowed by static exclude regexes. Allowlisted tickers survive every
//! exclusion.

use crate::domain::config::UniverseConfig;
use crate::domain::error::DislocationError;
use regex::{RegexSet, RegexSetBuilder};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct UniverseEntry {
    pub ticker: String,
    pub benchmark_proxy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Universe {
    pub entries: Vec<UniverseEntry>,
}

impl Universe {
    pub fn from_tickers(tickers: Vec<String>) -> Self {
        Universe {
            entries: tickers
                .into_iter()
                .map(|ticker| UniverseEntry {
                    ticker,
                    benchmark_proxy: None,
                })
                .collect(),
        }
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tickers(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.ticker.clone()).collect()
    }

    /// ticker -> benchmark proxy ticker, for entries that name one.
    pub fn benchmark_map(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|e| {
                e.benchmark_proxy
                    .as_ref()
                    .map(|b| (e.ticker.clone(), b.clone()))
            })
            .collect()
    }

    /// Drops tickers matching any exclude pattern unless allowlisted.
    pub fn filtered(&self, config: &UniverseConfig) -> Result<Universe, DislocationError> {
        let matcher = exclude_matcher(config)?;
        let allow: HashSet<String> = config.allowlist.iter().map(|t| t.to_uppercase()).collect();

        let entries: Vec<UniverseEntry> = self
            .entries
            .iter()
            .filter(|e| {
                allow.contains(&e.ticker)
                    || !matcher.as_ref().is_some_and(|m| m.is_match(&e.ticker))
            })
            .cloned()
            .collect();

        info!(
            loaded = self.count(),
            kept = entries.len(),
            "universe filtered by static patterns"
        );
        Ok(Universe { entries })
    }
}

/// Exclude patterns compiled case-insensitively; `None` when none are set.
pub fn exclude_matcher(config: &UniverseConfig) -> Result<Option<RegexSet>, DislocationError> {
    if config.exclude.is_empty() {
        return Ok(None);
    }
    RegexSetBuilder::new(&config.exclude)
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| DislocationError::config_invalid("universe", "exclude", e.to_string()))
}

/// Universe file to load. An explicit profile wins, then `[universe] file`,
/// then the configured profile. `None` when nothing is configured.
pub fn universe_path<'a>(
    config: &'a UniverseConfig,
    profile_override: Option<&str>,
) -> Result<Option<&'a str>, DislocationError> {
    let profile = match profile_override {
        Some(name) => Some(name.trim().to_lowercase()),
        None => {
            if let Some(file) = config.file.as_deref() {
                return Ok(Some(file));
            }
            config.profile.clone()
        }
    };
    match profile {
        Some(name) => config
            .files
            .get(&name)
            .map(|path| Some(path.as_str()))
            .ok_or_else(|| {
                DislocationError::config_invalid(
                    "universe",
                    "profile",
                    format!("profile '{name}' is not listed in [universe_files]"),
                )
            }),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

/// Parses a comma-separated ticker list, uppercasing each entry.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

pub fn parse_universe_csv(content: &str) -> Result<Universe, DislocationError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| DislocationError::Data {
            reason: format!("universe CSV header error: {e}"),
        })?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let ticker_col = column("ticker").ok_or_else(|| DislocationError::Data {
        reason: "universe CSV must contain a 'ticker' column".into(),
    })?;
    let proxy_col = column("benchmark_proxy");

    let mut entries = Vec::new();
    let mut seen = HashSet::new();
    for record in rdr.records() {
        let record = record.map_err(|e| DislocationError::Data {
            reason: format!("universe CSV parse error: {e}"),
        })?;
        let ticker = record.get(ticker_col).unwrap_or("").to_uppercase();
        if ticker.is_empty() || !seen.insert(ticker.clone()) {
            continue;
        }
        let benchmark_proxy = proxy_col
            .and_then(|c| record.get(c))
            .filter(|b| !b.is_empty())
            .map(|b| b.to_uppercase());
        entries.push(UniverseEntry {
            ticker,
            benchmark_proxy,
        });
    }

    Ok(Universe { entries })
}

pub fn load_universe(path: &Path) -> Result<Universe, DislocationError> {
    let content = std::fs::read_to_string(path).map_err(|e| DislocationError::Data {
        reason: format!("failed to read universe {}: {e}", path.display()),
    })?;
    let universe = parse_universe_csv(&content)?;
    info!(path = %path.display(), tickers = universe.count(), "universe loaded");
    Ok(universe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tickers_uppercases_and_trims() {
        assert_eq!(parse_tickers(" vtv, emb ,HYG").unwrap(), vec!["VTV", "EMB", "HYG"]);
    }

    #[test]
    fn parse_tickers_rejects_empty_and_duplicates() {
        assert!(matches!(parse_tickers("VTV,,EMB"), Err(UniverseError::EmptyToken)));
        assert!(matches!(
            parse_tickers("VTV,vtv"),
            Err(UniverseError::DuplicateTicker(t)) if t == "VTV"
        ));
    }

    #[test]
    fn csv_with_benchmark_map() {
        let universe = parse_universe_csv(
            "Ticker,Benchmark_Proxy,Name\nVTV,SPY,Value\nemb,,EM Bonds\nHYG,JNK,High Yield\n",
        )
        .unwrap();
        assert_eq!(universe.tickers(), vec!["VTV", "EMB", "HYG"]);
        let map = universe.benchmark_map();
        assert_eq!(map.get("VTV").map(String::as_str), Some("SPY"));
        assert!(!map.contains_key("EMB"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn csv_without_proxy_column() {
        let universe = parse_universe_csv("ticker\nVTV\nVTV\nIWM\n").unwrap();
        assert_eq!(universe.tickers(), vec!["VTV", "IWM"]);
        assert!(universe.benchmark_map().is_empty());
    }

    #[test]
    fn csv_without_ticker_column_fails() {
        assert!(matches!(
            parse_universe_csv("symbol\nVTV\n"),
            Err(DislocationError::Data { .. })
        ));
    }

    fn universe_config(exclude: &[&str], allowlist: &[&str]) -> UniverseConfig {
        UniverseConfig {
            exclude: exclude.iter().map(|p| p.to_string()).collect(),
            allowlist: allowlist.iter().map(|t| t.to_string()).collect(),
            ..UniverseConfig::default()
        }
    }

    #[test]
    fn exclude_patterns_respect_allowlist() {
        let universe = Universe::from_tickers(vec![
            "SPY".into(),
            "SPXL3X".into(),
            "TQQQ".into(),
            "SQQQ".into(),
        ]);
        let config = universe_config(&["3x", "qqq"], &["SQQQ"]);
        assert_eq!(universe.filtered(&config).unwrap().tickers(), vec!["SPY", "SQQQ"]);
    }

    #[test]
    fn anchored_patterns() {
        let universe = Universe::from_tickers(vec![
            "SPY".into(),
            "SPXL3X".into(),
            "SQ3XL".into(),
            "TQQQ".into(),
            "ATQ".into(),
        ]);
        let config = universe_config(&["3x$", "^t"], &[]);
        assert_eq!(
            universe.filtered(&config).unwrap().tickers(),
            vec!["SPY", "SQ3XL", "ATQ"]
        );
    }

    #[test]
    fn invalid_pattern_is_config_invalid() {
        let universe = Universe::from_tickers(vec!["SPY".into()]);
        let err = universe.filtered(&universe_config(&["(bear"], &[])).unwrap_err();
        assert!(matches!(err, DislocationError::ConfigInvalid { ref key, .. } if key == "exclude"));
    }

    #[test]
    fn path_resolution_order() {
        let mut config = UniverseConfig {
            profile: Some("core".into()),
            files: BTreeMap::from([
                ("core".to_string(), "core.csv".to_string()),
                ("broad".to_string(), "broad.csv".to_string()),
            ]),
            ..UniverseConfig::default()
        };
        assert_eq!(universe_path(&config, None).unwrap(), Some("core.csv"));
        assert_eq!(universe_path(&config, Some("Broad")).unwrap(), Some("broad.csv"));

        config.file = Some("override.csv".into());
        assert_eq!(universe_path(&config, None).unwrap(), Some("override.csv"));
        assert_eq!(universe_path(&config, Some("broad")).unwrap(), Some("broad.csv"));

        let err = universe_path(&config, Some("nope")).unwrap_err();
        assert!(matches!(err, DislocationError::ConfigInvalid { ref key, .. } if key == "profile"));

        assert_eq!(universe_path(&UniverseConfig::default(), None).unwrap(), None);
    }

    #[test]
    fn load_universe_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("universe.csv");
        std::fs::write(&path, "ticker,benchmark_proxy\nVTV,SPY\n").unwrap();
        let universe = load_universe(&path).unwrap();
        assert_eq!(universe.count(), 1);
        assert!(load_universe(&dir.path().join("missing.csv")).is_err());
    }
}
