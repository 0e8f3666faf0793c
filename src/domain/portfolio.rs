//! Single-asset portfolio ledger and equity tracking.
//!
//! Holds cash, at most one open long position, the closed trade history and
//! the equity curve. Every equity point satisfies
//! `cash + position_value == equity`.

use chrono::NaiveDateTime;

use super::execution::{
    EntryResult, ExecutionConfig, ExitResult, apply_slippage_long_entry, apply_slippage_long_exit,
    calculate_commission,
};
use super::position::{ExitReason, Position, Trade};

/// Relative slack allowed when checking an entry against available cash.
const CASH_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub open_time: NaiveDateTime,
    pub cash: f64,
    pub position_value: f64,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub initial_capital: f64,
    pub cash: f64,
    pub position: Option<Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            initial_capital,
            cash: initial_capital,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Buy `quantity` at `market_price` plus slippage, paying commission.
    ///
    /// Rejected without touching the ledger if a position is already open,
    /// the quantity is not positive, or the cost exceeds available cash.
    pub fn open_long(
        &mut self,
        time: NaiveDateTime,
        market_price: f64,
        quantity: f64,
        config: &ExecutionConfig,
    ) -> EntryResult {
        if self.position.is_some() {
            return EntryResult::AlreadyInPosition;
        }
        if quantity <= 0.0 || !quantity.is_finite() {
            return EntryResult::InsufficientCapital;
        }

        let execution_price = apply_slippage_long_entry(market_price, config.slippage_rate);
        let cost = quantity * execution_price;
        let commission = calculate_commission(cost, config.commission_rate);
        let total_cost = cost + commission;

        if total_cost > self.cash * (1.0 + CASH_TOLERANCE) {
            return EntryResult::InsufficientCapital;
        }

        // rounding overshoot within the tolerance lands on zero
        self.cash = (self.cash - total_cost).max(0.0);
        self.position = Some(Position {
            entry_time: time,
            entry_price: execution_price,
            quantity,
            entry_commission: commission,
        });

        EntryResult::Entered {
            quantity,
            execution_price,
            cost,
            commission,
        }
    }

    /// Sell the whole position at `market_price` less slippage and record
    /// the trade. Returns `None` when flat.
    pub fn close_long(
        &mut self,
        time: NaiveDateTime,
        market_price: f64,
        reason: ExitReason,
        config: &ExecutionConfig,
    ) -> Option<ExitResult> {
        let position = self.position.take()?;

        let exit_price = apply_slippage_long_exit(market_price, config.slippage_rate);
        let exit_value = position.quantity * exit_price;
        let exit_commission = calculate_commission(exit_value, config.commission_rate);
        let proceeds = exit_value - exit_commission;
        let pnl = proceeds - position.cost_basis();

        let entry_notional = position.quantity * position.entry_price;
        let pnl_pct = if entry_notional > 0.0 {
            pnl / entry_notional * 100.0
        } else {
            0.0
        };

        self.cash += proceeds;
        self.trades.push(Trade {
            entry_time: position.entry_time,
            exit_time: time,
            entry_price: position.entry_price,
            exit_price,
            quantity: position.quantity,
            entry_commission: position.entry_commission,
            exit_commission,
            pnl,
            pnl_pct,
            exit_reason: reason,
        });

        Some(ExitResult {
            quantity: position.quantity,
            exit_price,
            exit_value,
            exit_commission,
            pnl,
        })
    }

    /// Mark-to-market value at `close`.
    pub fn equity_at(&self, close: f64) -> f64 {
        self.cash + self.position_value(close)
    }

    pub fn position_value(&self, close: f64) -> f64 {
        self.position.as_ref().map_or(0.0, |p| p.market_value(close))
    }

    /// Append an equity point marked at `close`.
    pub fn mark(&mut self, time: NaiveDateTime, close: f64) -> &EquityPoint {
        let position_value = self.position_value(close);
        self.equity_curve.push(EquityPoint {
            open_time: time,
            cash: self.cash,
            position_value,
            equity: self.cash + position_value,
        });
        &self.equity_curve[self.equity_curve.len() - 1]
    }
}
