//! Bollinger Bands.
//!
//! middle = SMA(n), upper/lower = middle ± k * population stddev of the
//! last n closes. Warmup: first (n-1) bars.

use super::{Indicator, IndicatorValue};
use crate::domain::indicator_helpers::RollingWindow;
use crate::domain::ohlcv::MarketBar;

#[derive(Debug, Clone)]
pub struct Bollinger {
    window: RollingWindow,
    multiplier: f64,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64) -> Self {
        Self {
            window: RollingWindow::new(period),
            multiplier,
        }
    }
}

impl Indicator for Bollinger {
    fn update(&mut self, bar: &MarketBar) -> Option<IndicatorValue> {
        self.window.push(bar.close);
        if !self.window.is_full() {
            return None;
        }
        let middle = self.window.mean()?;
        let band = self.window.population_stddev()? * self.multiplier;
        Some(IndicatorValue::Bollinger {
            upper: middle + band,
            middle,
            lower: middle - band,
        })
    }
}
