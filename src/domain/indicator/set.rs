//! Per-bar indicator snapshots and the built-in streaming provider.

use super::{Indicator, IndicatorRef, IndicatorType, IndicatorValue};
use crate::domain::logic_tree::Operand;
use crate::domain::ohlcv::MarketBar;
use crate::ports::indicator_port::IndicatorProvider;
use chrono::NaiveDateTime;
use std::collections::{BTreeSet, HashMap};

/// Everything known as of one bar. Indicators still warming up are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub open_time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub values: HashMap<IndicatorType, IndicatorValue>,
}

impl IndicatorSnapshot {
    pub fn from_bar(bar: &MarketBar) -> Self {
        Self {
            open_time: bar.open_time,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            values: HashMap::new(),
        }
    }

    pub fn with_value(mut self, indicator_type: IndicatorType, value: IndicatorValue) -> Self {
        self.values.insert(indicator_type, value);
        self
    }

    pub fn get(&self, indicator_type: &IndicatorType) -> Option<&IndicatorValue> {
        self.values.get(indicator_type)
    }

    /// The default field of `indicator_type` as a finite number.
    pub fn simple(&self, indicator_type: &IndicatorType) -> Option<f64> {
        self.get(indicator_type)?
            .field(indicator_type.default_field())
    }

    pub fn indicator(&self, r: &IndicatorRef) -> Option<f64> {
        self.get(&r.indicator_type)?.field(r.field)
    }

    pub fn resolve(&self, operand: &Operand) -> Option<f64> {
        let v = match operand {
            Operand::Open => self.open,
            Operand::High => self.high,
            Operand::Low => self.low,
            Operand::Close => self.close,
            Operand::Volume => self.volume,
            Operand::Constant(v) => *v,
            Operand::Indicator(r) => return self.indicator(r),
        };
        v.is_finite().then_some(v)
    }
}

/// Streaming calculators for a fixed set of indicators.
pub struct IndicatorSet {
    calculators: Vec<(IndicatorType, Box<dyn Indicator>)>,
    current: Option<IndicatorSnapshot>,
    previous: Option<IndicatorSnapshot>,
}

impl IndicatorSet {
    pub fn new(types: impl IntoIterator<Item = IndicatorType>) -> Self {
        let unique: BTreeSet<IndicatorType> = types.into_iter().collect();
        let calculators = unique
            .into_iter()
            .map(|t| {
                let calc = t.build();
                (t, calc)
            })
            .collect();
        Self {
            calculators,
            current: None,
            previous: None,
        }
    }

    pub fn tracked(&self) -> impl Iterator<Item = &IndicatorType> {
        self.calculators.iter().map(|(t, _)| t)
    }
}

impl IndicatorProvider for IndicatorSet {
    fn advance(&mut self, bar: &MarketBar) {
        let mut snapshot = IndicatorSnapshot::from_bar(bar);
        for (indicator_type, calc) in self.calculators.iter_mut() {
            if let Some(value) = calc.update(bar) {
                snapshot.values.insert(indicator_type.clone(), value);
            }
        }
        self.previous = self.current.replace(snapshot);
    }

    fn current(&self) -> Option<&IndicatorSnapshot> {
        self.current.as_ref()
    }

    fn previous(&self) -> Option<&IndicatorSnapshot> {
        self.previous.as_ref()
    }
}
