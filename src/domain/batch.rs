//! Independent backtests run in parallel.
//!
//! Each job owns its strategy and config and borrows its bars read-only, so
//! runs share no mutable state. Results come back in input order.

use rayon::prelude::*;
use tracing::info;

use crate::domain::backtest::{BacktestConfig, BacktestResult, run};
use crate::domain::error::RegimeTraderError;
use crate::domain::ohlcv::MarketBar;
use crate::domain::strategy::CompositeStrategy;

#[derive(Debug, Clone)]
pub struct BacktestJob<'a> {
    pub label: String,
    pub bars: &'a [MarketBar],
    pub strategy: CompositeStrategy,
    pub config: BacktestConfig,
}

impl<'a> BacktestJob<'a> {
    pub fn new(bars: &'a [MarketBar], strategy: CompositeStrategy, config: BacktestConfig) -> Self {
        Self {
            label: strategy.name.clone(),
            bars,
            strategy,
            config,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

pub type BatchOutcome = (String, Result<BacktestResult, RegimeTraderError>);

pub fn run_batch(jobs: &[BacktestJob<'_>]) -> Vec<BatchOutcome> {
    info!(jobs = jobs.len(), threads = rayon::current_num_threads(), "batch starting");
    jobs.par_iter()
        .map(|job| (job.label.clone(), run(job.bars, &job.strategy, &job.config)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{IndicatorType, make_bars};
    use crate::domain::logic_tree::{Condition, LogicTree, Operand};

    fn crossover(fast: usize, slow: usize) -> CompositeStrategy {
        let entry = LogicTree::leaf(
            "golden",
            Operand::indicator(IndicatorType::Sma(fast)),
            Condition::CrossAbove(Operand::indicator(IndicatorType::Sma(slow))),
        );
        let exit = LogicTree::leaf(
            "death",
            Operand::indicator(IndicatorType::Sma(fast)),
            Condition::CrossBelow(Operand::indicator(IndicatorType::Sma(slow))),
        );
        CompositeStrategy::new(format!("sma_{fast}_{slow}"), entry, exit).unwrap()
    }

    fn run_batch_sequential(jobs: &[BacktestJob<'_>]) -> Vec<BatchOutcome> {
        jobs.iter()
            .map(|job| (job.label.clone(), run(job.bars, &job.strategy, &job.config)))
            .collect()
    }

    fn wave() -> Vec<MarketBar> {
        let closes: Vec<f64> = (0..300)
            .map(|i| 100.0 + 10.0 * (i as f64 / 15.0).sin())
            .collect();
        make_bars(&closes)
    }

    #[test]
    fn parallel_matches_sequential_in_order() {
        let bars = wave();
        let jobs: Vec<BacktestJob> = [(3, 10), (5, 20), (10, 30), (2, 8)]
            .iter()
            .map(|&(f, s)| BacktestJob::new(&bars, crossover(f, s), BacktestConfig::default()))
            .collect();

        let parallel = run_batch(&jobs);
        let sequential = run_batch_sequential(&jobs);

        assert_eq!(parallel.len(), 4);
        for ((pl, pr), (sl, sr)) in parallel.iter().zip(sequential.iter()) {
            assert_eq!(pl, sl);
            let (pr, sr) = (pr.as_ref().unwrap(), sr.as_ref().unwrap());
            assert_eq!(pr.trades, sr.trades);
            assert_eq!(pr.metrics.final_equity.to_bits(), sr.metrics.final_equity.to_bits());
        }
        assert_eq!(parallel[0].0, "sma_3_10");
        assert_eq!(parallel[3].0, "sma_2_8");
    }

    #[test]
    fn failing_job_does_not_affect_others() {
        let bars = wave();
        let bad_config = BacktestConfig {
            initial_capital: -1.0,
            ..BacktestConfig::default()
        };
        let jobs = vec![
            BacktestJob::new(&bars, crossover(3, 10), bad_config).with_label("bad"),
            BacktestJob::new(&bars, crossover(3, 10), BacktestConfig::default()).with_label("good"),
        ];
        let results = run_batch(&jobs);
        assert!(results[0].1.is_err());
        assert!(results[1].1.is_ok());
    }
}
