//! Shared test helpers: bar builders, mock data port, strategy and config fixtures.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use regimetrader::domain::backtest::{BacktestConfig, TerminalPolicy};
use regimetrader::domain::error::RegimeTraderError;
use regimetrader::domain::indicator::IndicatorType;
use regimetrader::domain::logic_tree::{CompareOp, Condition, LogicTree, Operand};
use regimetrader::domain::ohlcv::MarketBar;
use regimetrader::domain::strategy::CompositeStrategy;
use regimetrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub fn day(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(i as i64)
}

pub fn make_bar(open_time: NaiveDateTime, close: f64) -> MarketBar {
    MarketBar {
        symbol: "TEST".into(),
        timeframe: "1d".into(),
        open_time,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1_000.0,
    }
}

/// One daily bar per close, open/high/low equal to the close.
pub fn make_bars(closes: &[f64]) -> Vec<MarketBar> {
    closes.iter().enumerate().map(|(i, &c)| make_bar(day(i), c)).collect()
}

/// Bars with a high/low band around a deterministic wave, so volatility
/// indicators see non-zero ranges.
pub fn make_wavy_bars(n: usize) -> Vec<MarketBar> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            let close = 100.0 + 10.0 * (x / 7.0).sin() + 0.05 * x;
            let spread = 0.5 + 0.4 * (x / 11.0).cos().abs();
            MarketBar {
                symbol: "TEST".into(),
                timeframe: "1d".into(),
                open_time: day(i),
                open: close - 0.2,
                high: close + spread,
                low: close - spread,
                close,
                volume: 1_000.0 + (i % 13) as f64 * 50.0,
            }
        })
        .collect()
}

/// 100 for bars 0..=49, 110 for 50..=119, 90 afterwards.
/// SMA(5) crosses above SMA(20) at bar 50 and below it at bar 120.
pub fn golden_death_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| match i {
            0..=49 => 100.0,
            50..=119 => 110.0,
            _ => 90.0,
        })
        .collect()
}

pub fn sma(period: usize) -> Operand {
    Operand::indicator(IndicatorType::Sma(period))
}

pub fn sma_cross_strategy(fast: usize, slow: usize) -> CompositeStrategy {
    CompositeStrategy::new(
        "sma_cross",
        LogicTree::leaf("golden", sma(fast), Condition::CrossAbove(sma(slow))),
        LogicTree::leaf("death", sma(fast), Condition::CrossBelow(sma(slow))),
    )
    .unwrap()
}

/// Enter when close > `enter_above`, exit when close > `exit_above`.
pub fn close_threshold_strategy(enter_above: f64, exit_above: f64) -> CompositeStrategy {
    CompositeStrategy::new(
        "close_threshold",
        LogicTree::leaf(
            "enter",
            Operand::Close,
            Condition::Compare {
                op: CompareOp::Gt,
                rhs: Operand::Constant(enter_above),
            },
        ),
        LogicTree::leaf(
            "exit",
            Operand::Close,
            Condition::Compare {
                op: CompareOp::Gt,
                rhs: Operand::Constant(exit_above),
            },
        ),
    )
    .unwrap()
}

pub fn no_cost_config() -> BacktestConfig {
    BacktestConfig {
        commission_rate: 0.0,
        slippage_rate: 0.0,
        ..BacktestConfig::default()
    }
}

pub fn force_close_config() -> BacktestConfig {
    BacktestConfig {
        terminal_policy: TerminalPolicy::ForceClose,
        ..BacktestConfig::default()
    }
}

/// In-memory `DataPort` keyed by symbol.
pub struct MockDataPort {
    bars: HashMap<String, Vec<MarketBar>>,
    errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        MockDataPort {
            bars: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<MarketBar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<MarketBar>, RegimeTraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(RegimeTraderError::Data {
                reason: reason.clone(),
            });
        }
        let bars: Vec<MarketBar> = self
            .bars
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| start.is_none_or(|s| b.open_time >= s) && end.is_none_or(|e| b.open_time <= e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if bars.is_empty() {
            return Err(RegimeTraderError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            });
        }
        Ok(bars)
    }
}
