//! Cumulative volume-weighted average price over typical price.
//! Nothing is produced until some volume has traded.

use super::{Indicator, IndicatorValue};
use crate::domain::ohlcv::MarketBar;

#[derive(Debug, Clone, Default)]
pub struct Vwap {
    price_volume: f64,
    volume: f64,
}

impl Vwap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indicator for Vwap {
    fn update(&mut self, bar: &MarketBar) -> Option<IndicatorValue> {
        self.price_volume += bar.typical_price() * bar.volume;
        self.volume += bar.volume;
        if self.volume <= 0.0 {
            return None;
        }
        Some(IndicatorValue::Simple(self.price_volume / self.volume))
    }
}
