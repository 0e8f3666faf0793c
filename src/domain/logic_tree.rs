//! Strategy logic tree.
//!
//! This module defines the boolean condition tree used by strategies:
//! - `Operand`: What can be compared (price fields, constants, indicators)
//! - `Condition`: How the left operand is tested (comparison, crossing, range)
//! - `Signal`: A named leaf test
//! - `LogicTree`: Leaves combined with AND/OR
//!
//! Trees are validated once when a strategy is built; evaluation lives in
//! [`crate::domain::logic_eval`].

use crate::domain::error::StrategyError;
use crate::domain::indicator::{IndicatorRef, IndicatorType};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Open,
    High,
    Low,
    Close,
    Volume,
    Constant(f64),
    Indicator(IndicatorRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare { op: CompareOp, rhs: Operand },
    CrossAbove(Operand),
    CrossBelow(Operand),
    /// lower <= lhs <= upper
    Between { lower: f64, upper: f64 },
    /// lhs < lower or lhs > upper
    Outside { lower: f64, upper: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub name: String,
    pub lhs: Operand,
    pub condition: Condition,
    /// Bar timeframe the signal was written for. `None` means the run's own.
    pub timeframe: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOperator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogicTree {
    Leaf(Signal),
    Composite {
        operator: LogicOperator,
        children: Vec<LogicTree>,
    },
}

impl Operand {
    pub fn indicator(indicator_type: IndicatorType) -> Self {
        Operand::Indicator(IndicatorRef::new(indicator_type))
    }

    fn indicator_type(&self) -> Option<&IndicatorType> {
        match self {
            Operand::Indicator(r) => Some(&r.indicator_type),
            _ => None,
        }
    }
}

impl Condition {
    /// The right-hand operand, for conditions that have one.
    pub fn rhs(&self) -> Option<&Operand> {
        match self {
            Condition::Compare { rhs, .. } | Condition::CrossAbove(rhs) | Condition::CrossBelow(rhs) => {
                Some(rhs)
            }
            Condition::Between { .. } | Condition::Outside { .. } => None,
        }
    }

    pub fn is_crossing(&self) -> bool {
        matches!(self, Condition::CrossAbove(_) | Condition::CrossBelow(_))
    }
}

impl Signal {
    pub fn new(name: impl Into<String>, lhs: Operand, condition: Condition) -> Self {
        Self {
            name: name.into(),
            lhs,
            condition,
            timeframe: None,
        }
    }

    pub fn with_timeframe(mut self, timeframe: impl Into<String>) -> Self {
        self.timeframe = Some(timeframe.into());
        self
    }
}

impl LogicTree {
    pub fn leaf(name: impl Into<String>, lhs: Operand, condition: Condition) -> Self {
        LogicTree::Leaf(Signal::new(name, lhs, condition))
    }

    pub fn all(children: Vec<LogicTree>) -> Self {
        LogicTree::Composite {
            operator: LogicOperator::And,
            children,
        }
    }

    pub fn any(children: Vec<LogicTree>) -> Self {
        LogicTree::Composite {
            operator: LogicOperator::Or,
            children,
        }
    }

    /// Check the tree is well formed. `path` names this node in errors.
    pub fn validate(&self, path: &str) -> Result<(), StrategyError> {
        match self {
            LogicTree::Composite { children, .. } => {
                if children.is_empty() {
                    return Err(StrategyError::new(
                        format!("{}.children", path),
                        "composite node has no children",
                    ));
                }
                for (i, child) in children.iter().enumerate() {
                    child.validate(&format!("{}.children[{}]", path, i))?;
                }
                Ok(())
            }
            LogicTree::Leaf(signal) => validate_signal(signal, &format!("{}.signal", path)),
        }
    }

    /// Reject leaves pinned to a timeframe other than `timeframe`.
    /// Signals are evaluated on one bar series, so no resampling happens.
    pub fn check_timeframe(&self, path: &str, timeframe: &str) -> Result<(), StrategyError> {
        match self {
            LogicTree::Composite { children, .. } => {
                for (i, child) in children.iter().enumerate() {
                    child.check_timeframe(&format!("{}.children[{}]", path, i), timeframe)?;
                }
                Ok(())
            }
            LogicTree::Leaf(signal) => match signal.timeframe.as_deref() {
                Some(own) if !own.trim().eq_ignore_ascii_case(timeframe.trim()) => Err(StrategyError::new(
                    format!("{}.signal.timeframe", path),
                    format!(
                        "signal '{}' uses timeframe '{}' but bars are '{}'",
                        signal.name, own, timeframe
                    ),
                )),
                _ => Ok(()),
            },
        }
    }

    /// Every indicator referenced anywhere in the tree.
    pub fn indicators(&self) -> BTreeSet<IndicatorType> {
        let mut out = BTreeSet::new();
        self.collect_indicators(&mut out);
        out
    }

    fn collect_indicators(&self, out: &mut BTreeSet<IndicatorType>) {
        match self {
            LogicTree::Leaf(signal) => {
                let operands = std::iter::once(&signal.lhs).chain(signal.condition.rhs());
                out.extend(operands.filter_map(|o| o.indicator_type().cloned()));
            }
            LogicTree::Composite { children, .. } => {
                for child in children {
                    child.collect_indicators(out);
                }
            }
        }
    }

    /// Number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            LogicTree::Leaf(_) => 1,
            LogicTree::Composite { children, .. } => children.iter().map(|c| c.leaf_count()).sum(),
        }
    }
}

fn validate_operand(operand: &Operand, path: &str) -> Result<(), StrategyError> {
    match operand {
        Operand::Constant(v) if !v.is_finite() => Err(StrategyError::new(
            path,
            format!("constant {} is not a finite number", v),
        )),
        Operand::Indicator(r) => {
            r.indicator_type
                .validate()
                .map_err(|reason| StrategyError::new(path, reason))?;
            if !r.indicator_type.supports_field(r.field) {
                return Err(StrategyError::new(
                    path,
                    format!("{} has no '{}' component", r.indicator_type, r.field),
                ));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn validate_signal(signal: &Signal, path: &str) -> Result<(), StrategyError> {
    validate_operand(&signal.lhs, &format!("{}.indicator", path))?;

    let cond_path = format!("{}.condition", path);
    match &signal.condition {
        Condition::Compare { rhs, .. } | Condition::CrossAbove(rhs) | Condition::CrossBelow(rhs) => {
            validate_operand(rhs, &format!("{}.rhs", cond_path))?;
            if *rhs == signal.lhs {
                return Err(StrategyError::new(
                    cond_path,
                    format!("signal '{}' compares {} with itself", signal.name, signal.lhs),
                ));
            }
        }
        Condition::Between { lower, upper } | Condition::Outside { lower, upper } => {
            if !lower.is_finite() || !upper.is_finite() {
                return Err(StrategyError::new(cond_path, "range bounds must be finite numbers"));
            }
            if lower > upper {
                return Err(StrategyError::new(
                    cond_path,
                    format!("lower bound {} exceeds upper bound {}", lower, upper),
                ));
            }
        }
    }
    Ok(())
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Open => f.write_str("OPEN"),
            Operand::High => f.write_str("HIGH"),
            Operand::Low => f.write_str("LOW"),
            Operand::Close => f.write_str("CLOSE"),
            Operand::Volume => f.write_str("VOLUME"),
            Operand::Constant(v) => write!(f, "{}", v),
            Operand::Indicator(r) => write!(f, "{}", r),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare { op, rhs } => write!(f, "{} {}", op, rhs),
            Condition::CrossAbove(rhs) => write!(f, "CROSS_ABOVE {}", rhs),
            Condition::CrossBelow(rhs) => write!(f, "CROSS_BELOW {}", rhs),
            Condition::Between { lower, upper } => write!(f, "BETWEEN {} AND {}", lower, upper),
            Condition::Outside { lower, upper } => write!(f, "OUTSIDE {} AND {}", lower, upper),
        }
    }
}

impl fmt::Display for LogicOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicOperator::And => f.write_str("AND"),
            LogicOperator::Or => f.write_str("OR"),
        }
    }
}

impl fmt::Display for LogicTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicTree::Leaf(signal) => write!(f, "{} {}", signal.lhs, signal.condition),
            LogicTree::Composite { operator, children } => {
                f.write_str("(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", operator)?;
                    }
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
        }
    }
}
