//! Average True Range with Wilder's smoothing.
//!
//! TR on the first bar is high - low; afterwards the true range against the
//! previous close. Seeded with the mean of the first n TRs.

use super::{Indicator, IndicatorValue};
use crate::domain::indicator_helpers::WilderAverage;
use crate::domain::ohlcv::MarketBar;

#[derive(Debug, Clone)]
pub struct Atr {
    prev_close: Option<f64>,
    average: WilderAverage,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            prev_close: None,
            average: WilderAverage::new(period),
        }
    }
}

impl Indicator for Atr {
    fn update(&mut self, bar: &MarketBar) -> Option<IndicatorValue> {
        let tr = match self.prev_close {
            Some(prev) => bar.true_range(prev),
            None => bar.high - bar.low,
        };
        self.prev_close = Some(bar.close);
        self.average.push(tr).map(IndicatorValue::Simple)
    }
}
