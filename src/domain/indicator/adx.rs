//! Average Directional Index (Wilder).
//!
//! +DM/-DM from consecutive highs and lows, Wilder-smoothed alongside the
//! true range into +DI/-DI, then DX = 100 * |+DI - -DI| / (+DI + -DI) and
//! ADX = Wilder average of DX. Roughly 2n bars of warmup.

use super::{Indicator, IndicatorValue};
use crate::domain::indicator_helpers::WilderAverage;
use crate::domain::ohlcv::MarketBar;

#[derive(Debug, Clone)]
pub struct Adx {
    prev: Option<(f64, f64, f64)>,
    tr: WilderAverage,
    plus_dm: WilderAverage,
    minus_dm: WilderAverage,
    adx: WilderAverage,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Self {
            prev: None,
            tr: WilderAverage::new(period),
            plus_dm: WilderAverage::new(period),
            minus_dm: WilderAverage::new(period),
            adx: WilderAverage::new(period),
        }
    }
}

fn directional_index(dm: f64, tr: f64) -> f64 {
    if tr == 0.0 { 0.0 } else { 100.0 * dm / tr }
}

impl Indicator for Adx {
    fn update(&mut self, bar: &MarketBar) -> Option<IndicatorValue> {
        let (prev_high, prev_low, prev_close) =
            self.prev.replace((bar.high, bar.low, bar.close))?;

        let up = bar.high - prev_high;
        let down = prev_low - bar.low;
        let plus = if up > down && up > 0.0 { up } else { 0.0 };
        let minus = if down > up && down > 0.0 { down } else { 0.0 };

        let tr = self.tr.push(bar.true_range(prev_close));
        let plus = self.plus_dm.push(plus);
        let minus = self.minus_dm.push(minus);
        let (tr, plus, minus) = (tr?, plus?, minus?);

        let plus_di = directional_index(plus, tr);
        let minus_di = directional_index(minus, tr);
        let di_sum = plus_di + minus_di;
        let dx = if di_sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / di_sum
        };
        self.adx.push(dx).map(IndicatorValue::Simple)
    }
}
