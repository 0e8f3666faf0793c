//! Performance metrics over a finished run.

use super::portfolio::EquityPoint;
use super::position::Trade;

const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsConfig {
    /// Return periods per year, 252 for daily bars.
    pub annualization_factor: f64,
    /// Annual risk-free rate as a fraction.
    pub risk_free_rate: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            annualization_factor: 252.0,
            risk_free_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub final_equity: f64,
    pub total_return_pct: f64,
    /// CAGR over the calendar span of the equity curve.
    pub annual_return_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Deepest peak-to-trough decline, as a non-positive percentage.
    pub max_drawdown_pct: f64,
    /// Longest stretch under a previous peak, in bars.
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: f64,
    pub total_profit: f64,
    /// Sum of losing trade pnl as a positive magnitude.
    pub total_loss: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    /// Mean losing trade pnl (non-positive).
    pub avg_loss: f64,
    pub avg_trade: f64,
    pub max_win_streak: usize,
    pub max_loss_streak: usize,
    pub avg_trade_duration_hours: f64,
}

impl Metrics {
    pub fn compute(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        config: &MetricsConfig,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return_pct = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital * 100.0
        } else {
            0.0
        };

        let annual_return_pct = compute_cagr(equity_curve, initial_capital, final_equity);
        let (max_drawdown_pct, max_drawdown_duration) = compute_drawdown(equity_curve);
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity_curve, config);

        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut total_profit = 0.0_f64;
        let mut total_loss = 0.0_f64;
        let mut total_pnl = 0.0_f64;
        let mut total_hours = 0.0_f64;
        let mut max_win_streak = 0usize;
        let mut max_loss_streak = 0usize;
        let mut win_streak = 0usize;
        let mut loss_streak = 0usize;

        for trade in trades {
            total_pnl += trade.pnl;
            total_hours += trade.duration_hours();
            if trade.is_win() {
                winning_trades += 1;
                total_profit += trade.pnl;
                win_streak += 1;
                loss_streak = 0;
                max_win_streak = max_win_streak.max(win_streak);
            } else {
                losing_trades += 1;
                total_loss += trade.pnl.abs();
                loss_streak += 1;
                win_streak = 0;
                max_loss_streak = max_loss_streak.max(loss_streak);
            }
        }

        let total_trades = trades.len();
        let per_trade = |sum: f64, count: usize| if count > 0 { sum / count as f64 } else { 0.0 };

        let win_rate_pct = per_trade(winning_trades as f64 * 100.0, total_trades);

        let profit_factor = if total_loss > 0.0 {
            total_profit / total_loss
        } else if total_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Metrics {
            final_equity,
            total_return_pct,
            annual_return_pct,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown_pct,
            max_drawdown_duration,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate_pct,
            total_profit,
            total_loss,
            profit_factor,
            avg_win: per_trade(total_profit, winning_trades),
            avg_loss: per_trade(-total_loss, losing_trades),
            avg_trade: per_trade(total_pnl, total_trades),
            max_win_streak,
            max_loss_streak,
            avg_trade_duration_hours: per_trade(total_hours, total_trades),
        }
    }
}

fn compute_cagr(equity_curve: &[EquityPoint], initial_capital: f64, final_equity: f64) -> f64 {
    let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    let days = (last.open_time - first.open_time).num_seconds() as f64 / 86_400.0;
    let years = days / DAYS_PER_YEAR;
    if years <= 0.0 || initial_capital <= 0.0 || final_equity <= 0.0 {
        return 0.0;
    }
    ((final_equity / initial_capital).powf(1.0 / years) - 1.0) * 100.0
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut peak_idx = 0usize;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;

    for (i, point) in equity_curve.iter().enumerate() {
        if point.equity >= peak {
            peak = point.equity;
            peak_idx = i;
            continue;
        }
        if peak > 0.0 {
            let dd = (point.equity - peak) / peak * 100.0;
            if dd < max_dd {
                max_dd = dd;
            }
        }
        max_dd_duration = max_dd_duration.max(i - peak_idx);
    }

    (max_dd, max_dd_duration)
}

fn compute_risk_adjusted(equity_curve: &[EquityPoint], config: &MetricsConfig) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            let curr = w[1].equity;
            if prev > 0.0 { (curr - prev) / prev } else { 0.0 }
        })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let period_rf = config.risk_free_rate / config.annualization_factor;
    let excess_return = mean - period_rf;
    let scale = config.annualization_factor.sqrt();

    let sharpe = if stddev > 0.0 {
        excess_return / stddev * scale
    } else {
        0.0
    };

    let downside_sq: f64 = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum();
    let downside_stddev = (downside_sq / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        excess_return / downside_stddev * scale
    } else {
        0.0
    };

    (sharpe, sortino)
}
