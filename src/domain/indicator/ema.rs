//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the SMA of the first n closes, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k). Warmup: first (n-1) bars.

use super::{Indicator, IndicatorValue};
use crate::domain::indicator_helpers::EmaState;
use crate::domain::ohlcv::MarketBar;

#[derive(Debug, Clone)]
pub struct Ema {
    state: EmaState,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            state: EmaState::new(period),
        }
    }
}

impl Indicator for Ema {
    fn update(&mut self, bar: &MarketBar) -> Option<IndicatorValue> {
        self.state.push(bar.close).map(IndicatorValue::Simple)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{make_bars, run_simple};
    use super::*;

    #[test]
    fn ema_warmup_then_seed() {
        let bars = make_bars(&[2.0, 4.0, 6.0, 8.0]);
        let values = run_simple(&mut Ema::new(3), &bars);
        assert_eq!(values[0], None);
        assert_eq!(values[1], None);
        assert!((values[2].unwrap() - 4.0).abs() < f64::EPSILON);
        // k = 0.5
        assert!((values[3].unwrap() - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_reacts_faster_than_sma() {
        let mut closes = vec![10.0; 10];
        closes.push(20.0);
        let bars = make_bars(&closes);
        let ema = run_simple(&mut Ema::new(5), &bars);
        let sma = run_simple(&mut super::super::sma::Sma::new(5), &bars);
        assert!(ema[10].unwrap() > sma[10].unwrap());
    }
}
