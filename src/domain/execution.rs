//! Fill simulation: slippage, commission and position sizing.
//!
//! Fills are immediate, at the bar's close adjusted by slippage. Commission is
//! a fraction of the traded notional.

/// Rates applied to every fill.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Fraction of notional, e.g. 0.001 = 0.1%
    pub commission_rate: f64,
    /// Fraction of price, e.g. 0.0005 = 0.05%
    pub slippage_rate: f64,
    /// Fraction of cash committed per entry, in (0, 1]
    pub position_size_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_rate: 0.001,
            slippage_rate: 0.0005,
            position_size_pct: 1.0,
        }
    }
}

pub fn calculate_commission(trade_value: f64, commission_rate: f64) -> f64 {
    trade_value * commission_rate
}

/// Long entry (buy): execution_price = market_price * (1 + slippage_rate)
pub fn apply_slippage_long_entry(market_price: f64, slippage_rate: f64) -> f64 {
    market_price * (1.0 + slippage_rate)
}

/// Long exit (sell): execution_price = market_price * (1 - slippage_rate)
pub fn apply_slippage_long_exit(market_price: f64, slippage_rate: f64) -> f64 {
    market_price * (1.0 - slippage_rate)
}

/// Quantity to buy at `execution_price` so that notional plus commission
/// equals `cash * position_size_pct`.
///
/// quantity = cash / (1 + commission) * position_size_pct / execution_price
pub fn position_quantity(cash: f64, execution_price: f64, config: &ExecutionConfig) -> f64 {
    if cash <= 0.0 || execution_price <= 0.0 || !execution_price.is_finite() {
        return 0.0;
    }
    let cash_at_risk = cash / (1.0 + config.commission_rate);
    cash_at_risk * config.position_size_pct / execution_price
}

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        quantity: f64,
        execution_price: f64,
        cost: f64,
        commission: f64,
    },
    InsufficientCapital,
    AlreadyInPosition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitResult {
    pub quantity: f64,
    pub exit_price: f64,
    pub exit_value: f64,
    pub exit_commission: f64,
    pub pnl: f64,
}
