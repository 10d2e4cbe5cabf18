//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for dislocator.
///
/// Only fatal conditions live here. Per-instrument gaps and zero rolling
/// variance degrade to undefined signals instead of surfacing as errors.
#[derive(Debug, thiserror::Error)]
pub enum DislocationError {
    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown config key [{section}] {key}")]
    ConfigUnknown { section: String, key: String },

    #[error("missing data for {ticker}: {reason}")]
    MissingData { ticker: String, reason: String },

    #[error(
        "insufficient history for {ticker} at {date}: have {available} observations, need {required}"
    )]
    InsufficientHistory {
        ticker: String,
        date: NaiveDate,
        available: usize,
        required: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DislocationError {
    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        DislocationError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing_data(ticker: &str, reason: impl Into<String>) -> Self {
        DislocationError::MissingData {
            ticker: ticker.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&DislocationError> for std::process::ExitCode {
    fn from(err: &DislocationError) -> Self {
        let code: u8 = match err {
            DislocationError::Io(_) => 1,
            DislocationError::ConfigParse { .. }
            | DislocationError::ConfigMissing { .. }
            | DislocationError::ConfigInvalid { .. }
            | DislocationError::ConfigUnknown { .. } => 2,
            DislocationError::Data { .. } => 3,
            DislocationError::MissingData { .. } | DislocationError::InsufficientHistory { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_history_message_names_ticker_and_date() {
        let err = DislocationError::InsufficientHistory {
            ticker: "VTV".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            available: 40,
            required: 127,
        };
        let msg = err.to_string();
        assert!(msg.contains("VTV"));
        assert!(msg.contains("2024-03-01"));
        assert!(msg.contains("need 127"));
    }

    #[test]
    fn config_invalid_helper() {
        let err = DislocationError::config_invalid("risk", "max_weight", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid config value [risk] max_weight: must be positive"
        );
    }

    #[test]
    fn missing_data_helper() {
        let err = DislocationError::missing_data("universe", "no tickers");
        assert!(matches!(err, DislocationError::MissingData { ref ticker, .. } if ticker == "universe"));
    }
}
