//! Open position and closed trade records.

use chrono::{Duration, NaiveDateTime};
use std::fmt;

/// A long position. `entry_price` already includes slippage.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub quantity: f64,
    pub entry_commission: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Cash paid to open the position, commission included.
    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.entry_price + self.entry_commission
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.market_value(price) - self.cost_basis()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    /// The strategy's exit tree fired.
    Signal,
    /// Closed on the last bar by the terminal policy.
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Signal => f.write_str("signal"),
            ExitReason::EndOfData => f.write_str("end_of_data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub entry_commission: f64,
    pub exit_commission: f64,
    /// proceeds - cost basis, both commissions included
    pub pnl: f64,
    /// pnl relative to entry notional, in percent
    pub pnl_pct: f64,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn duration(&self) -> Duration {
        self.exit_time - self.entry_time
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration().num_seconds() as f64 / 3600.0
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}
