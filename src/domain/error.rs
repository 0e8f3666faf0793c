//! Domain error types.

use chrono::NaiveDateTime;

/// A strategy document error with the location of the offending node.
///
/// `path` is a dotted path into the strategy document, e.g.
/// `entry.children[1].signal.condition.operator`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid strategy at {path}: {message}")]
pub struct StrategyError {
    pub path: String,
    pub message: String,
}

impl StrategyError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Format the error with the offending path underlined on its own line.
    pub fn display_with_context(&self, strategy_name: &str) -> String {
        let underline = "^".repeat(self.path.len().max(1));
        format!(
            "strategy '{name}'\n  {path}\n  {underline}\n{message}",
            name = strategy_name,
            path = self.path,
            underline = underline,
            message = self.message
        )
    }
}

/// Top-level error type for regimetrader.
#[derive(Debug, thiserror::Error)]
pub enum RegimeTraderError {
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

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("bar {index} at {current} does not follow {previous}: timestamps must be strictly increasing")]
    DataGap {
        index: usize,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },

    #[error("no data for {symbol} ({timeframe})")]
    NoData { symbol: String, timeframe: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RegimeTraderError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        RegimeTraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(section: &str, key: &str) -> Self {
        RegimeTraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&RegimeTraderError> for std::process::ExitCode {
    fn from(err: &RegimeTraderError) -> Self {
        let code: u8 = match err {
            RegimeTraderError::Io(_) => 1,
            RegimeTraderError::ConfigParse { .. }
            | RegimeTraderError::ConfigMissing { .. }
            | RegimeTraderError::ConfigInvalid { .. } => 2,
            RegimeTraderError::Strategy(_) => 4,
            RegimeTraderError::DataGap { .. }
            | RegimeTraderError::NoData { .. }
            | RegimeTraderError::Data { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
