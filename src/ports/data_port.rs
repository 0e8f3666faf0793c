//! Bar source port.

use crate::domain::error::RegimeTraderError;
use crate::domain::ohlcv::MarketBar;
use chrono::NaiveDateTime;

pub trait DataPort {
    /// Bars for `symbol` at `timeframe` with `start <= open_time <= end`.
    /// Bars are returned in source order; ordering is not repaired.
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<MarketBar>, RegimeTraderError>;
}
