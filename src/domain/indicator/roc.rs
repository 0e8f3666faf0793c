//! Rate of Change.
//!
//! ROC = (C[i] - C[i-n]) / C[i-n] * 100. A zero base yields 0.
//! Warmup: first n bars.

use super::{Indicator, IndicatorValue};
use crate::domain::indicator_helpers::RollingWindow;
use crate::domain::ohlcv::MarketBar;

#[derive(Debug, Clone)]
pub struct Roc {
    closes: RollingWindow,
}

impl Roc {
    pub fn new(period: usize) -> Self {
        Self {
            closes: RollingWindow::new(period + 1),
        }
    }
}

impl Indicator for Roc {
    fn update(&mut self, bar: &MarketBar) -> Option<IndicatorValue> {
        self.closes.push(bar.close);
        if !self.closes.is_full() {
            return None;
        }
        let base = self.closes.oldest()?;
        let roc = if base == 0.0 {
            0.0
        } else {
            (bar.close - base) / base * 100.0
        };
        Some(IndicatorValue::Simple(roc))
    }
}
