//! Simple Moving Average.
//!
//! SMA = mean of the last n closes. Warmup: first (n-1) bars produce nothing.

use super::{Indicator, IndicatorValue};
use crate::domain::indicator_helpers::RollingWindow;
use crate::domain::ohlcv::MarketBar;

#[derive(Debug, Clone)]
pub struct Sma {
    window: RollingWindow,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            window: RollingWindow::new(period),
        }
    }
}

impl Indicator for Sma {
    fn update(&mut self, bar: &MarketBar) -> Option<IndicatorValue> {
        self.window.push(bar.close);
        if !self.window.is_full() {
            return None;
        }
        self.window.mean().map(IndicatorValue::Simple)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{make_bars, run_simple};
    use super::*;

    #[test]
    fn sma_warmup() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let values = run_simple(&mut Sma::new(3), &bars);
        assert_eq!(values[0], None);
        assert_eq!(values[1], None);
        assert!(values[2].is_some());
    }

    #[test]
    fn sma_basic_calculation() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let values = run_simple(&mut Sma::new(3), &bars);
        assert!((values[2].unwrap() - 2.0).abs() < f64::EPSILON);
        assert!((values[3].unwrap() - 3.0).abs() < f64::EPSILON);
        assert!((values[4].unwrap() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sma_flat_series_is_exact() {
        let bars = make_bars(&[100.1; 40]);
        let values = run_simple(&mut Sma::new(20), &bars);
        let first = values[19].unwrap();
        for v in values.iter().skip(19) {
            assert_eq!(v.unwrap().to_bits(), first.to_bits());
        }
    }

    #[test]
    fn sma_period_one_tracks_close() {
        let bars = make_bars(&[7.0, 8.0]);
        let values = run_simple(&mut Sma::new(1), &bars);
        assert_eq!(values, vec![Some(7.0), Some(8.0)]);
    }
}
