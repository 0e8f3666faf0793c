//! Configuration validation and assembly.
//!
//! Validates every config section before a run starts and builds the domain
//! config values from a [`ConfigPort`].

use crate::domain::adaptive::{DEFAULT_WINDOW, MAX_WINDOW};
use crate::domain::backtest::{BacktestConfig, TerminalPolicy};
use crate::domain::error::RegimeTraderError;
use crate::domain::indicator::MAX_PERIOD;
use crate::domain::regime::RegimeConfig;
use crate::domain::strategy::CompositeStrategy;
use crate::ports::config_port::ConfigPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

/// Where the bars for a run come from.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSpec {
    pub path: String,
    pub symbol: String,
    pub timeframe: String,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or RFC 3339.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn validate_backtest_section(config: &dyn ConfigPort) -> Result<(), RegimeTraderError> {
    let section = "backtest";

    let capital = config.get_double(section, "initial_capital", 10_000.0);
    if capital <= 0.0 {
        return Err(RegimeTraderError::invalid(section, "initial_capital", "initial_capital must be positive"));
    }

    for key in ["commission_rate", "slippage_rate", "risk_free_rate"] {
        let value = config.get_double(section, key, 0.0);
        if !(0.0..1.0).contains(&value) {
            return Err(RegimeTraderError::invalid(
                section,
                key,
                format!("{} must be in [0, 1), got {}", key, value),
            ));
        }
    }

    let size = config.get_double(section, "position_size_pct", 1.0);
    if size <= 0.0 || size > 1.0 {
        return Err(RegimeTraderError::invalid(
            section,
            "position_size_pct",
            "position_size_pct must be in (0, 1]",
        ));
    }

    bounded_count(config, section, "adaptive_window", DEFAULT_WINDOW, MAX_WINDOW)?;

    if config.get_double(section, "annualization_factor", 252.0) <= 0.0 {
        return Err(RegimeTraderError::invalid(
            section,
            "annualization_factor",
            "annualization_factor must be positive",
        ));
    }

    if let Some(policy) = config.get_string(section, "terminal_policy") {
        policy
            .parse::<TerminalPolicy>()
            .map_err(|reason| RegimeTraderError::invalid(section, "terminal_policy", reason))?;
    }
    Ok(())
}

/// `path` may come from the command line instead of the config file.
pub fn validate_data_section(
    config: &dyn ConfigPort,
    path_override: Option<&str>,
) -> Result<(), RegimeTraderError> {
    build_data_spec(config, path_override).map(|_| ())
}

/// The strategy path is only required when no path was given on the command line.
pub fn validate_strategy_section(
    config: &dyn ConfigPort,
    path_override: bool,
) -> Result<(), RegimeTraderError> {
    regime_gates_exits_override(config)?;
    if path_override {
        return Ok(());
    }
    require_string(config, "strategy", "path").map(|_| ())
}

/// `[strategy] regime_gates_exits`, when set, wins over the strategy file.
pub fn regime_gates_exits_override(config: &dyn ConfigPort) -> Result<Option<bool>, RegimeTraderError> {
    let key = "regime_gates_exits";
    let Some(raw) = config.get_string("strategy", key) else {
        return Ok(None);
    };
    let value = config.get_bool("strategy", key, true);
    // an unparseable value falls back to whichever default is passed
    if value != config.get_bool("strategy", key, false) {
        return Err(RegimeTraderError::invalid(
            "strategy",
            key,
            format!("expected true/false, yes/no or 1/0, got '{}'", raw),
        ));
    }
    Ok(Some(value))
}

/// Apply config-level overrides to a loaded strategy.
pub fn apply_strategy_overrides(
    config: &dyn ConfigPort,
    strategy: CompositeStrategy,
) -> Result<CompositeStrategy, RegimeTraderError> {
    match regime_gates_exits_override(config)? {
        Some(gates) => {
            debug!(strategy = %strategy.name, gates, "regime_gates_exits overridden by config");
            Ok(strategy.with_regime_gates_exits(gates))
        }
        None => Ok(strategy),
    }
}

pub fn validate_regime_section(config: &dyn ConfigPort) -> Result<(), RegimeTraderError> {
    build_regime_config(config).map(|_| ())
}

/// Build the run configuration, validating `[backtest]` and `[regime]`.
pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, RegimeTraderError> {
    validate_backtest_section(config)?;

    let defaults = BacktestConfig::default();
    let section = "backtest";
    let terminal_policy = match config.get_string(section, "terminal_policy") {
        Some(s) => s
            .parse()
            .map_err(|reason| RegimeTraderError::invalid(section, "terminal_policy", reason))?,
        None => defaults.terminal_policy,
    };

    let built = BacktestConfig {
        initial_capital: config.get_double(section, "initial_capital", defaults.initial_capital),
        commission_rate: config.get_double(section, "commission_rate", defaults.commission_rate),
        slippage_rate: config.get_double(section, "slippage_rate", defaults.slippage_rate),
        position_size_pct: config.get_double(section, "position_size_pct", defaults.position_size_pct),
        adaptive_window: bounded_count(config, section, "adaptive_window", defaults.adaptive_window, MAX_WINDOW)?,
        annualization_factor: config.get_double(section, "annualization_factor", defaults.annualization_factor),
        risk_free_rate: config.get_double(section, "risk_free_rate", defaults.risk_free_rate),
        terminal_policy,
        regime: build_regime_config(config)?,
    };
    debug!(?built, "backtest config built");
    Ok(built)
}

pub fn build_data_spec(
    config: &dyn ConfigPort,
    path_override: Option<&str>,
) -> Result<DataSpec, RegimeTraderError> {
    let section = "data";
    let path = match path_override {
        Some(p) => p.to_string(),
        None => require_string(config, section, "path")?,
    };
    let symbol = require_string(config, section, "symbol")?;
    let timeframe = require_string(config, section, "timeframe")?;
    let start = optional_datetime(config, section, "start")?;
    let end = optional_datetime(config, section, "end")?;

    if let (Some(s), Some(e)) = (start, end)
        && s >= e
    {
        return Err(RegimeTraderError::invalid(section, "start", "start must be before end"));
    }

    Ok(DataSpec {
        path,
        symbol,
        timeframe,
        start,
        end,
    })
}

/// Regime thresholds and indicator periods, with `[regime]` overrides applied.
pub fn build_regime_config(config: &dyn ConfigPort) -> Result<RegimeConfig, RegimeTraderError> {
    let d = RegimeConfig::default();
    let s = "regime";
    let period = |key: &str, default: usize| bounded_count(config, s, key, default, MAX_PERIOD);

    let regime = RegimeConfig {
        adx_sideways_threshold: config.get_double(s, "adx_sideways_threshold", d.adx_sideways_threshold),
        adx_strong_threshold: config.get_double(s, "adx_strong_threshold", d.adx_strong_threshold),
        adx_very_strong_threshold: config.get_double(s, "adx_very_strong_threshold", d.adx_very_strong_threshold),
        rsi_bullish: config.get_double(s, "rsi_bullish", d.rsi_bullish),
        rsi_bearish: config.get_double(s, "rsi_bearish", d.rsi_bearish),
        momentum_score_threshold: period("momentum_score_threshold", d.momentum_score_threshold)?,
        adaptive_window: d.adaptive_window,
        vol_low_percentile: config.get_double(s, "vol_low_percentile", d.vol_low_percentile),
        vol_high_percentile: config.get_double(s, "vol_high_percentile", d.vol_high_percentile),
        atr_default_thresholds: (
            config.get_double(s, "atr_default_low", d.atr_default_thresholds.0),
            config.get_double(s, "atr_default_high", d.atr_default_thresholds.1),
        ),
        width_default_thresholds: (
            config.get_double(s, "width_default_low", d.width_default_thresholds.0),
            config.get_double(s, "width_default_high", d.width_default_thresholds.1),
        ),
        sma_fast_period: period("sma_fast_period", d.sma_fast_period)?,
        sma_slow_period: period("sma_slow_period", d.sma_slow_period)?,
        adx_period: period("adx_period", d.adx_period)?,
        atr_period: period("atr_period", d.atr_period)?,
        bollinger_period: period("bollinger_period", d.bollinger_period)?,
        bollinger_mult: config.get_double(s, "bollinger_mult", d.bollinger_mult),
        roc_period: period("roc_period", d.roc_period)?,
        rsi_period: period("rsi_period", d.rsi_period)?,
        macd_fast: period("macd_fast", d.macd_fast)?,
        macd_slow: period("macd_slow", d.macd_slow)?,
        macd_signal: period("macd_signal", d.macd_signal)?,
    };

    if regime.sma_fast_period >= regime.sma_slow_period {
        return Err(RegimeTraderError::invalid(s, "sma_fast_period", "sma_fast_period must be below sma_slow_period"));
    }
    if regime.macd_fast >= regime.macd_slow {
        return Err(RegimeTraderError::invalid(s, "macd_fast", "macd_fast must be below macd_slow"));
    }
    if regime.adx_sideways_threshold > regime.adx_strong_threshold {
        return Err(RegimeTraderError::invalid(
            s,
            "adx_sideways_threshold",
            "adx_sideways_threshold must not exceed adx_strong_threshold",
        ));
    }
    if regime.rsi_bearish > regime.rsi_bullish {
        return Err(RegimeTraderError::invalid(s, "rsi_bearish", "rsi_bearish must not exceed rsi_bullish"));
    }
    let (lo, hi) = (regime.vol_low_percentile, regime.vol_high_percentile);
    if !(0.0..=100.0).contains(&lo) || !(0.0..=100.0).contains(&hi) || lo > hi {
        return Err(RegimeTraderError::invalid(
            s,
            "vol_low_percentile",
            "percentiles must satisfy 0 <= low <= high <= 100",
        ));
    }
    if regime.bollinger_mult <= 0.0 {
        return Err(RegimeTraderError::invalid(s, "bollinger_mult", "bollinger_mult must be positive"));
    }
    Ok(regime)
}

/// A whole number in `[1, max]`, or `default` when the key is absent.
fn bounded_count(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
    max: usize,
) -> Result<usize, RegimeTraderError> {
    let raw = config.get_int(section, key, i64::try_from(default).unwrap_or(i64::MAX));
    match usize::try_from(raw) {
        Ok(value) if (1..=max).contains(&value) => Ok(value),
        _ => Err(RegimeTraderError::invalid(
            section,
            key,
            format!("{} must be in [1, {}], got {}", key, max, raw),
        )),
    }
}

fn require_string(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, RegimeTraderError> {
    match config.get_string(section, key) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(RegimeTraderError::missing(section, key)),
    }
}

fn optional_datetime(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDateTime>, RegimeTraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => parse_datetime(&v).map(Some).ok_or_else(|| {
            RegimeTraderError::invalid(
                section,
                key,
                format!("invalid {} '{}', expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS", key, v),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn build_data_spec_of(config: &FileConfigAdapter) -> Result<DataSpec, RegimeTraderError> {
        build_data_spec(config, None)
    }

    fn invalid_key(err: RegimeTraderError) -> String {
        match err {
            RegimeTraderError::ConfigInvalid { key, .. } => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn empty_backtest_section_uses_defaults() {
        let config = build_backtest_config(&make_config("[backtest]\n")).unwrap();
        assert_eq!(config, BacktestConfig::default());
    }

    #[test]
    fn backtest_values_are_read() {
        let config = build_backtest_config(&make_config(
            r#"
[backtest]
initial_capital = 5000
commission_rate = 0.002
slippage_rate = 0.001
position_size_pct = 0.5
adaptive_window = 50
annualization_factor = 365
risk_free_rate = 0.02
terminal_policy = close
"#,
        ))
        .unwrap();
        assert_eq!(config.initial_capital, 5000.0);
        assert_eq!(config.commission_rate, 0.002);
        assert_eq!(config.position_size_pct, 0.5);
        assert_eq!(config.adaptive_window, 50);
        assert_eq!(config.annualization_factor, 365.0);
        assert_eq!(config.terminal_policy, TerminalPolicy::ForceClose);
        assert_eq!(config.regime_config().adaptive_window, 50);
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let err = validate_backtest_section(&make_config("[backtest]\ninitial_capital = 0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "initial_capital");
    }

    #[test]
    fn rates_must_be_fractions() {
        let err = validate_backtest_section(&make_config("[backtest]\ncommission_rate = -0.1\n")).unwrap_err();
        assert_eq!(invalid_key(err), "commission_rate");
        let err = validate_backtest_section(&make_config("[backtest]\nslippage_rate = 1.0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "slippage_rate");
        let err = validate_backtest_section(&make_config("[backtest]\nrisk_free_rate = 1.5\n")).unwrap_err();
        assert_eq!(invalid_key(err), "risk_free_rate");
    }

    #[test]
    fn position_size_bounds() {
        let err = validate_backtest_section(&make_config("[backtest]\nposition_size_pct = 0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "position_size_pct");
        let err = validate_backtest_section(&make_config("[backtest]\nposition_size_pct = 1.01\n")).unwrap_err();
        assert_eq!(invalid_key(err), "position_size_pct");
        assert!(validate_backtest_section(&make_config("[backtest]\nposition_size_pct = 1\n")).is_ok());
    }

    #[test]
    fn adaptive_window_must_be_positive() {
        let err = validate_backtest_section(&make_config("[backtest]\nadaptive_window = 0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "adaptive_window");
    }

    #[test]
    fn unknown_terminal_policy_fails() {
        let err = build_backtest_config(&make_config("[backtest]\nterminal_policy = liquidate\n")).unwrap_err();
        assert_eq!(invalid_key(err), "terminal_policy");
    }

    #[test]
    fn data_section_required_keys() {
        let err = build_data_spec_of(&make_config("[data]\nsymbol = BTC\ntimeframe = 1d\n")).unwrap_err();
        assert!(matches!(err, RegimeTraderError::ConfigMissing { key, .. } if key == "path"));
        let err = build_data_spec_of(&make_config("[data]\npath = a.csv\ntimeframe = 1d\n")).unwrap_err();
        assert!(matches!(err, RegimeTraderError::ConfigMissing { key, .. } if key == "symbol"));
    }

    #[test]
    fn data_section_dates() {
        let spec = build_data_spec_of(&make_config(
            "[data]\npath = a.csv\nsymbol = BTC\ntimeframe = 1h\nstart = 2024-01-01\nend = 2024-02-01 12:00:00\n",
        ))
        .unwrap();
        assert_eq!(spec.start, parse_datetime("2024-01-01"));
        assert_eq!(
            spec.end.map(|d| d.to_string()),
            Some("2024-02-01 12:00:00".to_string())
        );

        let err = build_data_spec_of(&make_config(
            "[data]\npath = a.csv\nsymbol = BTC\ntimeframe = 1h\nstart = 2024-03-01\nend = 2024-02-01\n",
        ))
        .unwrap_err();
        assert_eq!(invalid_key(err), "start");

        let err = build_data_spec_of(&make_config(
            "[data]\npath = a.csv\nsymbol = BTC\ntimeframe = 1h\nstart = 2024/03/01\n",
        ))
        .unwrap_err();
        assert_eq!(invalid_key(err), "start");
    }

    #[test]
    fn data_path_override() {
        let config = make_config("[data]\nsymbol = BTC\ntimeframe = 1d\n");
        let spec = build_data_spec(&config, Some("other.csv")).unwrap();
        assert_eq!(spec.path, "other.csv");
        assert!(validate_data_section(&config, None).is_err());
    }

    #[test]
    fn strategy_path_optional_with_override() {
        let config = make_config("[strategy]\n");
        assert!(validate_strategy_section(&config, true).is_ok());
        assert!(matches!(
            validate_strategy_section(&config, false),
            Err(RegimeTraderError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn regime_overrides() {
        let regime = build_regime_config(&make_config(
            "[regime]\nadx_sideways_threshold = 18\nsma_fast_period = 20\nsma_slow_period = 100\n",
        ))
        .unwrap();
        assert_eq!(regime.adx_sideways_threshold, 18.0);
        assert_eq!(regime.sma_fast_period, 20);
        assert_eq!(regime.sma_slow_period, 100);
        assert_eq!(regime.rsi_period, 14);
    }

    #[test]
    fn regime_inconsistent_values_fail() {
        let err = validate_regime_section(&make_config("[regime]\nsma_fast_period = 200\n")).unwrap_err();
        assert_eq!(invalid_key(err), "sma_fast_period");
        let err = validate_regime_section(&make_config("[regime]\nrsi_period = 0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "rsi_period");
        let err = validate_regime_section(&make_config("[regime]\nvol_low_percentile = 80\n")).unwrap_err();
        assert_eq!(invalid_key(err), "vol_low_percentile");
    }

    #[test]
    fn config_overrides_regime_gates_exits() {
        use crate::domain::logic_tree::{Condition, LogicTree, Operand};
        let leaf = || LogicTree::leaf("band", Operand::Close, Condition::Between { lower: 1.0, upper: 2.0 });
        let strategy = CompositeStrategy::new("s", leaf(), leaf()).unwrap();
        assert!(strategy.regime_gates_exits);

        let config = make_config("[strategy]\npath = s.json\nregime_gates_exits = no\n");
        assert!(validate_strategy_section(&config, false).is_ok());
        let overridden = apply_strategy_overrides(&config, strategy.clone()).unwrap();
        assert!(!overridden.regime_gates_exits);

        let config = make_config("[strategy]\npath = s.json\n");
        assert_eq!(regime_gates_exits_override(&config).unwrap(), None);
        assert!(apply_strategy_overrides(&config, strategy.clone()).unwrap().regime_gates_exits);

        let config = make_config("[strategy]\nregime_gates_exits = sometimes\n");
        let err = validate_strategy_section(&config, true).unwrap_err();
        assert_eq!(invalid_key(err), "regime_gates_exits");
        assert!(apply_strategy_overrides(&config, strategy).is_err());
    }

    #[test]
    fn oversized_counts_are_config_errors() {
        let err = validate_backtest_section(&make_config("[backtest]\nadaptive_window = 9223372036854775807\n"))
            .unwrap_err();
        assert_eq!(invalid_key(err), "adaptive_window");
        let err = build_backtest_config(&make_config("[backtest]\nadaptive_window = -5\n")).unwrap_err();
        assert_eq!(invalid_key(err), "adaptive_window");
        let err = validate_regime_section(&make_config("[regime]\nsma_slow_period = 1000000000000000\n")).unwrap_err();
        assert_eq!(invalid_key(err), "sma_slow_period");
        let err = validate_regime_section(&make_config("[regime]\nmacd_signal = 20000\n")).unwrap_err();
        assert_eq!(invalid_key(err), "macd_signal");
    }

    #[test]
    fn parse_datetime_formats() {
        let midnight = parse_datetime("2024-05-06").unwrap();
        assert_eq!(midnight.to_string(), "2024-05-06 00:00:00");
        assert!(parse_datetime("2024-05-06 13:30:00").is_some());
        assert!(parse_datetime("2024-05-06T13:30:00").is_some());
        assert_eq!(
            parse_datetime("2024-05-06T13:30:00+02:00").map(|d| d.to_string()),
            Some("2024-05-06 11:30:00".to_string())
        );
        assert!(parse_datetime("06/05/2024").is_none());
    }
}
