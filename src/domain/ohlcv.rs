//! Market bar representation.
//!
//! Bars are immutable once produced; their order is the only clock the
//! simulator has.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct MarketBar {
    pub symbol: String,
    pub timeframe: String,
    pub open_time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl MarketBar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}
