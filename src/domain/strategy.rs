//! Composite strategy: entry/exit logic trees behind an optional regime filter.

use crate::domain::error::StrategyError;
use crate::domain::indicator::{IndicatorSnapshot, IndicatorType};
use crate::domain::logic_eval::evaluate;
use crate::domain::logic_tree::LogicTree;
use crate::domain::regime::{MomentumState, RegimeState, SimplifiedRegime, TrendState, VolatilityState};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    None,
    Enter,
    Exit,
}

/// Per-axis allow-lists. An axis left as `None` is not filtered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubRegimeFilter {
    pub trend: Option<BTreeSet<TrendState>>,
    pub volatility: Option<BTreeSet<VolatilityState>>,
    pub momentum: Option<BTreeSet<MomentumState>>,
}

impl SubRegimeFilter {
    pub fn allows(&self, regime: &RegimeState) -> bool {
        self.trend.as_ref().is_none_or(|s| s.contains(&regime.trend))
            && self.volatility.as_ref().is_none_or(|s| s.contains(&regime.volatility))
            && self.momentum.as_ref().is_none_or(|s| s.contains(&regime.momentum))
    }

    pub fn is_empty(&self) -> bool {
        self.trend.is_none() && self.volatility.is_none() && self.momentum.is_none()
    }
}

/// Immutable strategy configuration, owned by the engine for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeStrategy {
    pub name: String,
    pub description: String,
    pub entry: LogicTree,
    pub exit: LogicTree,
    pub regime_filter: Option<BTreeSet<SimplifiedRegime>>,
    pub sub_regime_filter: Option<SubRegimeFilter>,
    /// When false the regime filter only blocks entries.
    pub regime_gates_exits: bool,
}

impl CompositeStrategy {
    /// Build a strategy with no regime filter, validating both trees.
    pub fn new(name: impl Into<String>, entry: LogicTree, exit: LogicTree) -> Result<Self, StrategyError> {
        let strategy = Self {
            name: name.into(),
            description: String::new(),
            entry,
            exit,
            regime_filter: None,
            sub_regime_filter: None,
            regime_gates_exits: true,
        };
        strategy.validate()?;
        Ok(strategy)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_regime_filter(mut self, allowed: impl IntoIterator<Item = SimplifiedRegime>) -> Self {
        self.regime_filter = Some(allowed.into_iter().collect());
        self
    }

    pub fn with_sub_regime_filter(mut self, filter: SubRegimeFilter) -> Self {
        self.sub_regime_filter = Some(filter);
        self
    }

    pub fn with_regime_gates_exits(mut self, gates: bool) -> Self {
        self.regime_gates_exits = gates;
        self
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.name.trim().is_empty() {
            return Err(StrategyError::new("name", "strategy name is empty"));
        }
        self.entry.validate("entry")?;
        self.exit.validate("exit")?;
        Ok(())
    }

    /// Both trees must match the timeframe of the bars they run on.
    pub fn check_timeframe(&self, timeframe: &str) -> Result<(), StrategyError> {
        self.entry.check_timeframe("entry", timeframe)?;
        self.exit.check_timeframe("exit", timeframe)
    }

    pub fn has_regime_filter(&self) -> bool {
        self.regime_filter.is_some() || self.sub_regime_filter.as_ref().is_some_and(|f| !f.is_empty())
    }

    /// Whether `regime` passes every configured filter. An empty allow-list allows nothing.
    pub fn regime_allows(&self, regime: &RegimeState) -> bool {
        let simplified_ok = self
            .regime_filter
            .as_ref()
            .is_none_or(|allowed| allowed.contains(&regime.simplified));
        let sub_ok = self.sub_regime_filter.as_ref().is_none_or(|f| f.allows(regime));
        simplified_ok && sub_ok
    }

    /// Whether the regime filter suppresses the decision for this bar.
    pub fn is_gated(&self, position_open: bool, regime: &RegimeState) -> bool {
        if position_open && !self.regime_gates_exits {
            return false;
        }
        !self.regime_allows(regime)
    }

    /// Entry is only considered while flat and exit only while in a position.
    /// The regime filter is checked first and short-circuits both trees.
    pub fn decide(
        &self,
        position_open: bool,
        regime: &RegimeState,
        now: &IndicatorSnapshot,
        prev: Option<&IndicatorSnapshot>,
    ) -> Decision {
        if self.is_gated(position_open, regime) {
            return Decision::None;
        }
        if position_open {
            if evaluate(&self.exit, now, prev) {
                return Decision::Exit;
            }
        } else if evaluate(&self.entry, now, prev) {
            return Decision::Enter;
        }
        Decision::None
    }

    /// Every indicator the entry and exit trees reference.
    pub fn indicators(&self) -> BTreeSet<IndicatorType> {
        let mut all = self.entry.indicators();
        all.extend(self.exit.indicators());
        all
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Decision::None => "none",
            Decision::Enter => "enter",
            Decision::Exit => "exit",
        };
        f.write_str(s)
    }
}
