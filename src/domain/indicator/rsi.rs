//! RSI (Relative Strength Index) with Wilder's smoothing.
//!
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)). If avg_loss == 0 the RSI
//! is 100, or 50 when there were no gains either (a flat series).
//!
//! Warmup: the first n bars (n price changes are needed).

use super::{Indicator, IndicatorValue};
use crate::domain::indicator_helpers::WilderAverage;
use crate::domain::ohlcv::MarketBar;

#[derive(Debug, Clone)]
pub struct Rsi {
    prev_close: Option<f64>,
    gains: WilderAverage,
    losses: WilderAverage,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            prev_close: None,
            gains: WilderAverage::new(period),
            losses: WilderAverage::new(period),
        }
    }
}

impl Indicator for Rsi {
    fn update(&mut self, bar: &MarketBar) -> Option<IndicatorValue> {
        let prev = self.prev_close.replace(bar.close)?;
        let change = bar.close - prev;
        let avg_gain = self.gains.push(change.max(0.0));
        let avg_loss = self.losses.push((-change).max(0.0));
        let (avg_gain, avg_loss) = (avg_gain?, avg_loss?);

        let rsi = if avg_loss == 0.0 {
            if avg_gain == 0.0 { 50.0 } else { 100.0 }
        } else {
            100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
        };
        Some(IndicatorValue::Simple(rsi))
    }
}
