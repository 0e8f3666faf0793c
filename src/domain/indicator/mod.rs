//! Technical indicators.
//!
//! This module provides the types shared by every indicator:
//! - `IndicatorType`: indicator identity + parameters (serves as HashMap key)
//! - `IndicatorValue`: enum for different indicator output shapes
//! - `IndicatorField`: which output of a multi-value indicator to read
//! - `IndicatorRef`: an indicator together with the field to read
//! - `Indicator`: the streaming contract every calculator implements
//!
//! Calculators are fed one bar at a time and only ever see bars up to and
//! including the current one. While warming up they return `None`.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod roc;
pub mod rsi;
pub mod set;
pub mod sma;
pub mod vwap;

pub use set::{IndicatorSet, IndicatorSnapshot};

use crate::domain::ohlcv::MarketBar;
use std::fmt;

/// Longest lookback any indicator may be configured with.
pub const MAX_PERIOD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Roc(usize),
    Atr(usize),
    Adx(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    Vwap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorField {
    Value,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
    /// (upper - lower) / middle
    BollingerWidth,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndicatorRef {
    pub indicator_type: IndicatorType,
    pub field: IndicatorField,
}

/// Streaming indicator calculator.
pub trait Indicator: Send {
    /// Feed the next bar and return the value as of that bar.
    fn update(&mut self, bar: &MarketBar) -> Option<IndicatorValue>;
}

impl IndicatorType {
    /// Bollinger bands with a float multiplier, stored as hundredths so the
    /// type stays hashable.
    pub fn bollinger(period: usize, stddev_mult: f64) -> Self {
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100: (stddev_mult * 100.0).round().max(0.0) as u32,
        }
    }

    /// The field read when a reference names no component.
    pub fn default_field(&self) -> IndicatorField {
        match self {
            IndicatorType::Macd { .. } => IndicatorField::MacdLine,
            IndicatorType::Bollinger { .. } => IndicatorField::BollingerMiddle,
            _ => IndicatorField::Value,
        }
    }

    pub fn supports_field(&self, field: IndicatorField) -> bool {
        match self {
            IndicatorType::Macd { .. } => matches!(
                field,
                IndicatorField::MacdLine | IndicatorField::MacdSignal | IndicatorField::MacdHistogram
            ),
            IndicatorType::Bollinger { .. } => matches!(
                field,
                IndicatorField::BollingerUpper
                    | IndicatorField::BollingerMiddle
                    | IndicatorField::BollingerLower
                    | IndicatorField::BollingerWidth
            ),
            _ => field == IndicatorField::Value,
        }
    }

    /// Check the parameters are usable. Returns a human readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        let check = |period: usize| -> Result<(), String> {
            if period == 0 {
                return Err(format!("{} period must be positive", self));
            }
            if period > MAX_PERIOD {
                return Err(format!("{} period exceeds the maximum of {}", self, MAX_PERIOD));
            }
            Ok(())
        };
        match self {
            IndicatorType::Sma(p)
            | IndicatorType::Ema(p)
            | IndicatorType::Rsi(p)
            | IndicatorType::Roc(p)
            | IndicatorType::Atr(p)
            | IndicatorType::Adx(p) => check(*p)?,
            IndicatorType::Macd { fast, slow, signal } => {
                check(*fast)?;
                check(*slow)?;
                check(*signal)?;
                if fast >= slow {
                    return Err(format!("{} fast period must be below slow period", self));
                }
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                check(*period)?;
                if *stddev_mult_x100 == 0 {
                    return Err(format!("{} multiplier must be positive", self));
                }
            }
            IndicatorType::Vwap => {}
        }
        Ok(())
    }

    /// Create a fresh streaming calculator for this indicator.
    pub fn build(&self) -> Box<dyn Indicator> {
        match *self {
            IndicatorType::Sma(period) => Box::new(sma::Sma::new(period)),
            IndicatorType::Ema(period) => Box::new(ema::Ema::new(period)),
            IndicatorType::Rsi(period) => Box::new(rsi::Rsi::new(period)),
            IndicatorType::Roc(period) => Box::new(roc::Roc::new(period)),
            IndicatorType::Atr(period) => Box::new(atr::Atr::new(period)),
            IndicatorType::Adx(period) => Box::new(adx::Adx::new(period)),
            IndicatorType::Macd { fast, slow, signal } => {
                Box::new(macd::Macd::new(fast, slow, signal))
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => Box::new(bollinger::Bollinger::new(
                period,
                stddev_mult_x100 as f64 / 100.0,
            )),
            IndicatorType::Vwap => Box::new(vwap::Vwap::new()),
        }
    }
}

impl IndicatorValue {
    /// Read one field. A field that does not match the value's shape reads as `None`.
    pub fn field(&self, field: IndicatorField) -> Option<f64> {
        let v = match (self, field) {
            (IndicatorValue::Simple(v), IndicatorField::Value) => *v,
            (IndicatorValue::Macd { line, .. }, IndicatorField::MacdLine) => *line,
            (IndicatorValue::Macd { signal, .. }, IndicatorField::MacdSignal) => *signal,
            (IndicatorValue::Macd { histogram, .. }, IndicatorField::MacdHistogram) => *histogram,
            (IndicatorValue::Bollinger { upper, .. }, IndicatorField::BollingerUpper) => *upper,
            (IndicatorValue::Bollinger { middle, .. }, IndicatorField::BollingerMiddle) => *middle,
            (IndicatorValue::Bollinger { lower, .. }, IndicatorField::BollingerLower) => *lower,
            (
                IndicatorValue::Bollinger {
                    upper,
                    middle,
                    lower,
                },
                IndicatorField::BollingerWidth,
            ) => {
                if *middle == 0.0 {
                    0.0
                } else {
                    (upper - lower) / middle
                }
            }
            _ => return None,
        };
        v.is_finite().then_some(v)
    }
}

impl IndicatorRef {
    pub fn new(indicator_type: IndicatorType) -> Self {
        let field = indicator_type.default_field();
        Self {
            indicator_type,
            field,
        }
    }

    pub fn with_field(indicator_type: IndicatorType, field: IndicatorField) -> Self {
        Self {
            indicator_type,
            field,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Roc(period) => write!(f, "ROC({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BB({},{})", period, mult)
            }
            IndicatorType::Vwap => write!(f, "VWAP"),
        }
    }
}

impl fmt::Display for IndicatorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndicatorField::Value => "value",
            IndicatorField::MacdLine => "macd",
            IndicatorField::MacdSignal => "signal",
            IndicatorField::MacdHistogram => "histogram",
            IndicatorField::BollingerUpper => "upper",
            IndicatorField::BollingerMiddle => "middle",
            IndicatorField::BollingerLower => "lower",
            IndicatorField::BollingerWidth => "width",
        };
        f.write_str(name)
    }
}

impl fmt::Display for IndicatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field == IndicatorField::Value {
            write!(f, "{}", self.indicator_type)
        } else {
            write!(f, "{}.{}", self.indicator_type, self.field)
        }
    }
}

/// Synthetic bars from close prices, shared by the calculator tests.
#[cfg(test)]
pub(crate) fn make_bars(closes: &[f64]) -> Vec<MarketBar> {
    use chrono::NaiveDate;
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| MarketBar {
            symbol: "TEST".into(),
            timeframe: "1d".into(),
            open_time: start + chrono::Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Feed every bar and collect the simple values (NaN while warming up).
#[cfg(test)]
pub(crate) fn run_simple(indicator: &mut dyn Indicator, bars: &[MarketBar]) -> Vec<Option<f64>> {
    bars.iter()
        .map(|b| indicator.update(b).and_then(|v| v.field(IndicatorField::Value)))
        .collect()
}
