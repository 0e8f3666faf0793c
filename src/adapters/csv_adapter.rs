//! CSV bar file adapter.
//!
//! Expects a header row with at least `open_time,open,high,low,close,volume`.
//! Extra columns are ignored. Rows are kept in file order.

use crate::domain::config_validation::parse_datetime;
use crate::domain::error::RegimeTraderError;
use crate::domain::ohlcv::MarketBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct CsvRow {
    open_time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_rows(&self) -> Result<Vec<(usize, CsvRow)>, RegimeTraderError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| RegimeTraderError::Data {
                reason: format!("failed to open {}: {}", self.path.display(), e),
            })?;

        let mut rows = Vec::new();
        for (i, result) in rdr.deserialize::<CsvRow>().enumerate() {
            // header is line 1
            let line = i + 2;
            let row = result.map_err(|e| RegimeTraderError::Data {
                reason: format!("{} line {}: {}", self.path.display(), line, e),
            })?;
            rows.push((line, row));
        }
        Ok(rows)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<MarketBar>, RegimeTraderError> {
        let rows = self.read_rows()?;
        let total = rows.len();
        let mut bars = Vec::with_capacity(total);

        for (line, row) in rows {
            let open_time = parse_datetime(&row.open_time).ok_or_else(|| RegimeTraderError::Data {
                reason: format!(
                    "{} line {}: invalid open_time '{}'",
                    self.path.display(),
                    line,
                    row.open_time
                ),
            })?;

            if start.is_some_and(|s| open_time < s) || end.is_some_and(|e| open_time > e) {
                continue;
            }

            bars.push(MarketBar {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
                open_time,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        debug!(path = %self.path.display(), rows = total, kept = bars.len(), "csv loaded");

        if bars.is_empty() {
            if total > 0 {
                warn!(rows = total, "every row fell outside the date range");
            }
            return Err(RegimeTraderError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            });
        }
        Ok(bars)
    }
}
