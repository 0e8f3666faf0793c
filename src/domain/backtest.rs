//! Backtest engine and event loop.
//!
//! The engine is a two-state machine (`Flat` / `InPosition`) driven one bar at
//! a time. Each bar, strictly in order:
//!
//! 1. advance the indicator provider
//! 2. feed the adaptive volatility trackers
//! 3. classify the regime
//! 4. ask the strategy for a decision
//! 5. fill an entry (when flat) or an exit (when in position)
//! 6. append an equity point
//!
//! Nothing in a step reads a bar after the current one.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, trace, warn};

use crate::domain::adaptive::MAX_WINDOW;
use crate::domain::error::RegimeTraderError;
use crate::domain::execution::{
    EntryResult, ExecutionConfig, apply_slippage_long_entry, position_quantity,
};
use crate::domain::indicator::IndicatorSet;
use crate::domain::metrics::{Metrics, MetricsConfig};
use crate::domain::ohlcv::MarketBar;
use crate::domain::portfolio::{EquityPoint, Portfolio};
use crate::domain::position::{ExitReason, Trade};
use crate::domain::regime::{RegimeClassifier, RegimeConfig, RegimeState};
use crate::domain::strategy::{CompositeStrategy, Decision};
use crate::ports::indicator_port::IndicatorProvider;

/// What happens to a position still open after the last bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminalPolicy {
    /// Leave it open, marked to the last close.
    #[default]
    HoldOpen,
    /// Close it at the last close, with slippage and commission.
    ForceClose,
}

impl FromStr for TerminalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hold" | "hold_open" => Ok(TerminalPolicy::HoldOpen),
            "close" | "force_close" => Ok(TerminalPolicy::ForceClose),
            other => Err(format!("unknown terminal policy '{}' (expected hold or close)", other)),
        }
    }
}

impl fmt::Display for TerminalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalPolicy::HoldOpen => f.write_str("hold"),
            TerminalPolicy::ForceClose => f.write_str("close"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub commission_rate: f64,
    pub slippage_rate: f64,
    pub position_size_pct: f64,
    pub adaptive_window: usize,
    pub annualization_factor: f64,
    pub risk_free_rate: f64,
    pub terminal_policy: TerminalPolicy,
    /// Classifier settings; `adaptive_window` above takes precedence over the
    /// window stored here.
    pub regime: RegimeConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            commission_rate: 0.001,
            slippage_rate: 0.0005,
            position_size_pct: 1.0,
            adaptive_window: 100,
            annualization_factor: 252.0,
            risk_free_rate: 0.0,
            terminal_policy: TerminalPolicy::HoldOpen,
            regime: RegimeConfig::default(),
        }
    }
}

impl BacktestConfig {
    pub fn execution(&self) -> ExecutionConfig {
        ExecutionConfig {
            commission_rate: self.commission_rate,
            slippage_rate: self.slippage_rate,
            position_size_pct: self.position_size_pct,
        }
    }

    pub fn metrics(&self) -> MetricsConfig {
        MetricsConfig {
            annualization_factor: self.annualization_factor,
            risk_free_rate: self.risk_free_rate,
        }
    }

    pub fn regime_config(&self) -> RegimeConfig {
        RegimeConfig {
            adaptive_window: self.adaptive_window,
            ..self.regime.clone()
        }
    }

    pub fn validate(&self) -> Result<(), RegimeTraderError> {
        let invalid = |key: &str, reason: String| Err(RegimeTraderError::invalid("backtest", key, reason));

        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return invalid("initial_capital", format!("must be positive, got {}", self.initial_capital));
        }
        for (key, value) in [
            ("commission_rate", self.commission_rate),
            ("slippage_rate", self.slippage_rate),
            ("risk_free_rate", self.risk_free_rate),
        ] {
            if !(0.0..1.0).contains(&value) {
                return invalid(key, format!("must be in [0, 1), got {}", value));
            }
        }
        if !(self.position_size_pct > 0.0 && self.position_size_pct <= 1.0) {
            return invalid(
                "position_size_pct",
                format!("must be in (0, 1], got {}", self.position_size_pct),
            );
        }
        if self.adaptive_window == 0 || self.adaptive_window > MAX_WINDOW {
            return invalid(
                "adaptive_window",
                format!("must be in [1, {}], got {}", MAX_WINDOW, self.adaptive_window),
            );
        }
        self.regime_config().validate()?;
        if !(self.annualization_factor.is_finite() && self.annualization_factor > 0.0) {
            return invalid(
                "annualization_factor",
                format!("must be positive, got {}", self.annualization_factor),
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Flat,
    InPosition,
}

/// Regime and decision of one processed bar.
#[derive(Debug, Clone, PartialEq)]
pub struct BarRecord {
    pub open_time: NaiveDateTime,
    pub regime: RegimeState,
    pub decision: Decision,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub bars_processed: usize,
    pub signals_generated: usize,
    pub orders_executed: usize,
    /// Bars on which the regime filter suppressed the strategy.
    pub regime_blocked: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: Metrics,
    pub bars: Vec<BarRecord>,
    pub stats: RunStats,
    /// Set when a position was still open after the last bar.
    pub open_position: bool,
}

/// Check bars are in strictly increasing time order with finite prices.
pub fn validate_bars(bars: &[MarketBar]) -> Result<(), RegimeTraderError> {
    for (i, bar) in bars.iter().enumerate() {
        let prices = [bar.open, bar.high, bar.low, bar.close, bar.volume];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(RegimeTraderError::Data {
                reason: format!("bar {} at {} has a non-finite value", i, bar.open_time),
            });
        }
    }
    for (i, pair) in bars.windows(2).enumerate() {
        if pair[1].open_time <= pair[0].open_time {
            return Err(RegimeTraderError::DataGap {
                index: i + 1,
                previous: pair[0].open_time,
                current: pair[1].open_time,
            });
        }
    }
    Ok(())
}

/// Bar-by-bar simulator for one strategy over one bar stream.
pub struct BacktestEngine<'a, P: IndicatorProvider> {
    strategy: &'a CompositeStrategy,
    config: &'a BacktestConfig,
    execution: ExecutionConfig,
    provider: P,
    classifier: RegimeClassifier,
    portfolio: Portfolio,
    state: EngineState,
    last_bar: Option<(NaiveDateTime, f64)>,
    records: Vec<BarRecord>,
    stats: RunStats,
}

impl<'a, P: IndicatorProvider> BacktestEngine<'a, P> {
    pub fn new(strategy: &'a CompositeStrategy, config: &'a BacktestConfig, provider: P) -> Self {
        Self {
            strategy,
            config,
            execution: config.execution(),
            provider,
            classifier: RegimeClassifier::new(config.regime_config()),
            portfolio: Portfolio::new(config.initial_capital),
            state: EngineState::Flat,
            last_bar: None,
            records: Vec::new(),
            stats: RunStats::default(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn records(&self) -> &[BarRecord] {
        &self.records
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Process the next bar. Bars must arrive in strictly increasing time order.
    pub fn step(&mut self, bar: &MarketBar) -> Result<&BarRecord, RegimeTraderError> {
        if let Some((previous, _)) = self.last_bar
            && bar.open_time <= previous
        {
            return Err(RegimeTraderError::DataGap {
                index: self.stats.bars_processed,
                previous,
                current: bar.open_time,
            });
        }

        self.provider.advance(bar);
        let Some(now) = self.provider.current() else {
            return Err(RegimeTraderError::Data {
                reason: format!("indicator provider has no snapshot for {}", bar.open_time),
            });
        };
        let prev = self.provider.previous();

        self.classifier.observe(now);
        let regime = self.classifier.classify(now);

        let position_open = self.state == EngineState::InPosition;
        if self.strategy.is_gated(position_open, &regime) {
            self.stats.regime_blocked += 1;
        }
        let decision = self.strategy.decide(position_open, &regime, now, prev);
        if decision != Decision::None {
            self.stats.signals_generated += 1;
        }

        match (decision, self.state) {
            (Decision::Enter, EngineState::Flat) => {
                let execution_price = apply_slippage_long_entry(bar.close, self.execution.slippage_rate);
                let quantity = position_quantity(self.portfolio.cash, execution_price, &self.execution);
                match self
                    .portfolio
                    .open_long(bar.open_time, bar.close, quantity, &self.execution)
                {
                    EntryResult::Entered {
                        quantity,
                        execution_price,
                        commission,
                        ..
                    } => {
                        self.state = EngineState::InPosition;
                        self.stats.orders_executed += 1;
                        debug!(
                            time = %bar.open_time,
                            price = execution_price,
                            quantity,
                            commission,
                            regime = %regime.simplified,
                            "entered long"
                        );
                    }
                    rejected => {
                        warn!(time = %bar.open_time, ?rejected, "entry signal not filled");
                    }
                }
            }
            (Decision::Exit, EngineState::InPosition) => {
                self.close_position(bar.open_time, bar.close, ExitReason::Signal);
            }
            _ => {}
        }

        self.portfolio.mark(bar.open_time, bar.close);
        self.last_bar = Some((bar.open_time, bar.close));
        self.stats.bars_processed += 1;

        trace!(
            time = %bar.open_time,
            close = bar.close,
            regime = %regime.full_regime,
            simplified = %regime.simplified,
            %decision,
            equity = self.portfolio.equity_at(bar.close),
            "bar processed"
        );

        self.records.push(BarRecord {
            open_time: bar.open_time,
            regime,
            decision,
        });
        let index = self.records.len() - 1;
        Ok(&self.records[index])
    }

    fn close_position(&mut self, time: NaiveDateTime, close: f64, reason: ExitReason) {
        if let Some(exit) = self.portfolio.close_long(time, close, reason, &self.execution) {
            self.state = EngineState::Flat;
            self.stats.orders_executed += 1;
            debug!(
                time = %time,
                price = exit.exit_price,
                quantity = exit.quantity,
                pnl = exit.pnl,
                %reason,
                "exited long"
            );
        }
    }

    /// Apply the terminal policy and compute metrics.
    pub fn finish(mut self) -> BacktestResult {
        if self.config.terminal_policy == TerminalPolicy::ForceClose
            && self.state == EngineState::InPosition
            && let Some((time, close)) = self.last_bar
        {
            self.close_position(time, close, ExitReason::EndOfData);
            // the last point was marked before the close; re-mark it
            self.portfolio.equity_curve.pop();
            self.portfolio.mark(time, close);
        }

        let open_position = self.state == EngineState::InPosition;
        let metrics = Metrics::compute(
            &self.portfolio.trades,
            &self.portfolio.equity_curve,
            self.portfolio.initial_capital,
            &self.config.metrics(),
        );

        info!(
            strategy = %self.strategy.name,
            bars = self.stats.bars_processed,
            trades = self.portfolio.trades.len(),
            final_equity = metrics.final_equity,
            total_return_pct = metrics.total_return_pct,
            "backtest finished"
        );

        BacktestResult {
            trades: self.portfolio.trades,
            equity_curve: self.portfolio.equity_curve,
            metrics,
            bars: self.records,
            stats: self.stats,
            open_position,
        }
    }
}

/// Run `strategy` over `bars` with the built-in indicator set.
pub fn run(
    bars: &[MarketBar],
    strategy: &CompositeStrategy,
    config: &BacktestConfig,
) -> Result<BacktestResult, RegimeTraderError> {
    // indicator periods are checked before any calculator is built
    config.validate()?;
    strategy.validate()?;
    let mut indicators = strategy.indicators();
    indicators.extend(config.regime_config().required_indicators());
    debug!(count = indicators.len(), "indicators tracked");
    run_with_provider(bars, strategy, config, IndicatorSet::new(indicators))
}

/// Run with an externally supplied indicator provider. The provider must
/// cover every indicator the strategy and the regime classifier read;
/// missing values behave like indicators still warming up.
pub fn run_with_provider<P: IndicatorProvider>(
    bars: &[MarketBar],
    strategy: &CompositeStrategy,
    config: &BacktestConfig,
    provider: P,
) -> Result<BacktestResult, RegimeTraderError> {
    config.validate()?;
    strategy.validate()?;
    validate_bars(bars)?;
    if let Some(first) = bars.first() {
        strategy.check_timeframe(&first.timeframe)?;
    }

    info!(
        strategy = %strategy.name,
        bars = bars.len(),
        initial_capital = config.initial_capital,
        terminal_policy = %config.terminal_policy,
        "backtest starting"
    );
    if bars.is_empty() {
        warn!("no bars to process");
    }

    let mut engine = BacktestEngine::new(strategy, config, provider);
    for bar in bars {
        engine.step(bar)?;
    }
    Ok(engine.finish())
}

/// Classify every bar without trading. Same indicator and classifier
/// sequence as a backtest, so the regimes match a run's `BarRecord`s.
pub fn replay_regimes(
    bars: &[MarketBar],
    regime: &RegimeConfig,
) -> Result<Vec<(NaiveDateTime, RegimeState)>, RegimeTraderError> {
    regime.validate()?;
    validate_bars(bars)?;
    let mut provider = IndicatorSet::new(regime.required_indicators());
    let mut classifier = RegimeClassifier::new(regime.clone());
    let mut out = Vec::with_capacity(bars.len());
    for bar in bars {
        provider.advance(bar);
        let Some(now) = provider.current() else {
            continue;
        };
        out.push((bar.open_time, classifier.update(now)));
    }
    debug!(bars = out.len(), "regime replay finished");
    Ok(out)
}
