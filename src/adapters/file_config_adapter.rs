//! INI file configuration adapter.

use crate::domain::error::RegimeTraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RegimeTraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| RegimeTraderError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, RegimeTraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| RegimeTraderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    /// Blank values read as missing.
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[data]
path = data/btc_1d.csv
symbol = BTCUSDT

[backtest]
initial_capital = 10000.0
terminal_policy = hold
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("data", "path"),
            Some("data/btc_1d.csv".to_string())
        );
        assert_eq!(
            adapter.get_string("backtest", "terminal_policy"),
            Some("hold".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_capital = 100\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn blank_value_reads_as_missing() {
        let adapter = FileConfigAdapter::from_string("[data]\npath =\nsymbol =   \n").unwrap();
        assert_eq!(adapter.get_string("data", "path"), None);
        assert_eq!(adapter.get_string("data", "symbol"), None);
    }

    #[test]
    fn get_int_returns_value() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\nadaptive_window = 50\n").unwrap();
        assert_eq!(adapter.get_int("backtest", "adaptive_window", 0), 50);
    }

    #[test]
    fn get_int_returns_default_for_missing_or_non_numeric() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\nadaptive_window = abc\n").unwrap();
        assert_eq!(adapter.get_int("backtest", "adaptive_window", 42), 42);
        assert_eq!(adapter.get_int("backtest", "missing", 7), 7);
    }

    #[test]
    fn get_double_returns_value() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ncommission_rate = 0.002\n").unwrap();
        assert_eq!(adapter.get_double("backtest", "commission_rate", 0.0), 0.002);
    }

    #[test]
    fn get_double_returns_default_for_missing_or_non_numeric() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_capital = lots\n").unwrap();
        assert_eq!(adapter.get_double("backtest", "initial_capital", 99.9), 99.9);
        assert_eq!(adapter.get_double("backtest", "missing", 1.5), 1.5);
    }

    #[test]
    fn get_bool_values() {
        let adapter = FileConfigAdapter::from_string(
            "[strategy]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\n",
        )
        .unwrap();
        for key in ["a", "b", "c"] {
            assert!(adapter.get_bool("strategy", key, false));
        }
        for key in ["d", "e", "f"] {
            assert!(!adapter.get_bool("strategy", key, true));
        }
        assert!(adapter.get_bool("strategy", "missing", true));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[strategy]\npath = strategies/golden_cross.json\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("strategy", "path"),
            Some("strategies/golden_cross.json".to_string())
        );
    }

    #[test]
    fn from_file_missing_is_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini").unwrap_err();
        assert!(matches!(err, RegimeTraderError::ConfigParse { .. }));
    }
}
