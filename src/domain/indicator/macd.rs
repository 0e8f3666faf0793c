//! MACD (Moving Average Convergence Divergence).
//!
//! line = EMA(fast) - EMA(slow), signal = EMA(signal) of the line,
//! histogram = line - signal. The signal EMA starts once the slow EMA is
//! seeded, so the first value arrives after slow + signal - 1 bars.

use super::{Indicator, IndicatorValue};
use crate::domain::indicator_helpers::EmaState;
use crate::domain::ohlcv::MarketBar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone)]
pub struct Macd {
    fast: EmaState,
    slow: EmaState,
    signal: EmaState,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: EmaState::new(fast),
            slow: EmaState::new(slow),
            signal: EmaState::new(signal),
        }
    }
}

impl Indicator for Macd {
    fn update(&mut self, bar: &MarketBar) -> Option<IndicatorValue> {
        let fast = self.fast.push(bar.close);
        let slow = self.slow.push(bar.close);
        let line = fast? - slow?;
        let signal = self.signal.push(line)?;
        Some(IndicatorValue::Macd {
            line,
            signal,
            histogram: line - signal,
        })
    }
}
