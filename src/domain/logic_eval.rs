//! Logic tree evaluation.
//!
//! Evaluates a [`LogicTree`] against the indicator snapshot of the current bar
//! and, for crossings, the snapshot of the bar before it.
//!
//! # Evaluation Semantics
//!
//! - Comparisons read only the current snapshot
//! - `CROSS_ABOVE`: previous left <= previous right and current left > current right
//! - `CROSS_BELOW`: previous left >= previous right and current left < current right
//! - Crossings are `false` when there is no previous snapshot
//! - An operand that cannot be resolved (indicator still warming up) makes the
//!   leaf `false`
//! - `AND`/`OR` evaluate every child; evaluation has no side effects

use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::logic_tree::{CompareOp, Condition, LogicOperator, LogicTree, Operand, Signal};

/// Absolute tolerance for `==` and `!=`.
pub const EQUALITY_TOLERANCE: f64 = 1e-6;

pub fn evaluate(tree: &LogicTree, now: &IndicatorSnapshot, prev: Option<&IndicatorSnapshot>) -> bool {
    match tree {
        LogicTree::Leaf(signal) => evaluate_signal(signal, now, prev),
        LogicTree::Composite { operator, children } => {
            let results: Vec<bool> = children.iter().map(|c| evaluate(c, now, prev)).collect();
            match operator {
                LogicOperator::And => !results.is_empty() && results.iter().all(|r| *r),
                LogicOperator::Or => results.iter().any(|r| *r),
            }
        }
    }
}

pub fn evaluate_signal(signal: &Signal, now: &IndicatorSnapshot, prev: Option<&IndicatorSnapshot>) -> bool {
    let Some(lhs) = now.resolve(&signal.lhs) else {
        return false;
    };

    match &signal.condition {
        Condition::Compare { op, rhs } => match now.resolve(rhs) {
            Some(rhs) => compare(*op, lhs, rhs),
            None => false,
        },
        Condition::CrossAbove(rhs) => crossing(signal, rhs, now, prev)
            .is_some_and(|(pl, pr, cl, cr)| pl <= pr && cl > cr),
        Condition::CrossBelow(rhs) => crossing(signal, rhs, now, prev)
            .is_some_and(|(pl, pr, cl, cr)| pl >= pr && cl < cr),
        Condition::Between { lower, upper } => lhs >= *lower && lhs <= *upper,
        Condition::Outside { lower, upper } => lhs < *lower || lhs > *upper,
    }
}

/// (prev_lhs, prev_rhs, now_lhs, now_rhs), or `None` if any is unavailable.
fn crossing(
    signal: &Signal,
    rhs: &Operand,
    now: &IndicatorSnapshot,
    prev: Option<&IndicatorSnapshot>,
) -> Option<(f64, f64, f64, f64)> {
    let prev = prev?;
    Some((
        prev.resolve(&signal.lhs)?,
        prev.resolve(rhs)?,
        now.resolve(&signal.lhs)?,
        now.resolve(rhs)?,
    ))
}

fn compare(op: CompareOp, lhs: f64, rhs: f64) -> bool {
    match op {
        CompareOp::Lt => lhs < rhs,
        CompareOp::Gt => lhs > rhs,
        CompareOp::Le => lhs <= rhs,
        CompareOp::Ge => lhs >= rhs,
        CompareOp::Eq => (lhs - rhs).abs() < EQUALITY_TOLERANCE,
        CompareOp::Ne => (lhs - rhs).abs() >= EQUALITY_TOLERANCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{IndicatorType, IndicatorValue};
    use chrono::NaiveDate;

    fn snap(close: f64, fast: Option<f64>, slow: Option<f64>) -> IndicatorSnapshot {
        let mut s = IndicatorSnapshot {
            open_time: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10.0,
            values: Default::default(),
        };
        if let Some(v) = fast {
            s.values.insert(IndicatorType::Sma(5), IndicatorValue::Simple(v));
        }
        if let Some(v) = slow {
            s.values.insert(IndicatorType::Sma(20), IndicatorValue::Simple(v));
        }
        s
    }

    fn cross_above() -> LogicTree {
        LogicTree::leaf(
            "golden",
            Operand::indicator(IndicatorType::Sma(5)),
            Condition::CrossAbove(Operand::indicator(IndicatorType::Sma(20))),
        )
    }

    fn cross_below() -> LogicTree {
        LogicTree::leaf(
            "death",
            Operand::indicator(IndicatorType::Sma(5)),
            Condition::CrossBelow(Operand::indicator(IndicatorType::Sma(20))),
        )
    }

    fn close_cmp(op: CompareOp, value: f64) -> LogicTree {
        LogicTree::leaf(
            "close",
            Operand::Close,
            Condition::Compare {
                op,
                rhs: Operand::Constant(value),
            },
        )
    }

    #[test]
    fn cross_above_fires_on_transition() {
        let prev = snap(0.0, Some(9.0), Some(10.0));
        let now = snap(0.0, Some(11.0), Some(10.0));
        assert!(evaluate(&cross_above(), &now, Some(&prev)));
        assert!(!evaluate(&cross_below(), &now, Some(&prev)));
    }

    #[test]
    fn cross_above_from_equal_fires() {
        let prev = snap(0.0, Some(10.0), Some(10.0));
        let now = snap(0.0, Some(10.5), Some(10.0));
        assert!(evaluate(&cross_above(), &now, Some(&prev)));
    }

    #[test]
    fn cross_above_needs_strict_current() {
        let prev = snap(0.0, Some(9.0), Some(10.0));
        let now = snap(0.0, Some(10.0), Some(10.0));
        assert!(!evaluate(&cross_above(), &now, Some(&prev)));
    }

    #[test]
    fn staying_above_is_not_a_cross() {
        let prev = snap(0.0, Some(11.0), Some(10.0));
        let now = snap(0.0, Some(12.0), Some(10.0));
        assert!(!evaluate(&cross_above(), &now, Some(&prev)));
    }

    #[test]
    fn cross_below_fires_on_transition() {
        let prev = snap(0.0, Some(11.0), Some(10.0));
        let now = snap(0.0, Some(9.0), Some(10.0));
        assert!(evaluate(&cross_below(), &now, Some(&prev)));
    }

    #[test]
    fn crossing_without_previous_is_false() {
        let now = snap(0.0, Some(11.0), Some(10.0));
        assert!(!evaluate(&cross_above(), &now, None));
    }

    #[test]
    fn crossing_with_warming_previous_is_false() {
        let prev = snap(0.0, Some(9.0), None);
        let now = snap(0.0, Some(11.0), Some(10.0));
        assert!(!evaluate(&cross_above(), &now, Some(&prev)));
    }

    #[test]
    fn unresolved_indicator_is_false() {
        let tree = LogicTree::leaf(
            "rsi",
            Operand::indicator(IndicatorType::Rsi(14)),
            Condition::Compare {
                op: CompareOp::Lt,
                rhs: Operand::Constant(100.0),
            },
        );
        assert!(!evaluate(&tree, &snap(1.0, None, None), None));
    }

    #[test]
    fn comparisons() {
        let now = snap(100.0, None, None);
        assert!(evaluate(&close_cmp(CompareOp::Gt, 99.0), &now, None));
        assert!(!evaluate(&close_cmp(CompareOp::Lt, 99.0), &now, None));
        assert!(evaluate(&close_cmp(CompareOp::Ge, 100.0), &now, None));
        assert!(evaluate(&close_cmp(CompareOp::Le, 100.0), &now, None));
    }

    #[test]
    fn equality_uses_tolerance() {
        let now = snap(100.0000001, None, None);
        assert!(evaluate(&close_cmp(CompareOp::Eq, 100.0), &now, None));
        assert!(!evaluate(&close_cmp(CompareOp::Ne, 100.0), &now, None));
        assert!(evaluate(&close_cmp(CompareOp::Ne, 100.01), &now, None));
    }

    #[test]
    fn between_and_outside_are_inclusive_and_exclusive() {
        let now = snap(50.0, None, None);
        let between = LogicTree::leaf("b", Operand::Close, Condition::Between { lower: 50.0, upper: 60.0 });
        let outside = LogicTree::leaf("o", Operand::Close, Condition::Outside { lower: 50.0, upper: 60.0 });
        assert!(evaluate(&between, &now, None));
        assert!(!evaluate(&outside, &now, None));
    }

    #[test]
    fn and_or_fold() {
        let now = snap(100.0, None, None);
        let t = close_cmp(CompareOp::Gt, 50.0);
        let f = close_cmp(CompareOp::Lt, 50.0);
        assert!(evaluate(&LogicTree::all(vec![t.clone(), t.clone()]), &now, None));
        assert!(!evaluate(&LogicTree::all(vec![t.clone(), f.clone()]), &now, None));
        assert!(evaluate(&LogicTree::any(vec![f.clone(), t.clone()]), &now, None));
        assert!(!evaluate(&LogicTree::any(vec![f.clone(), f]), &now, None));
        assert!(evaluate(&LogicTree::any(vec![LogicTree::all(vec![t])]), &now, None));
    }

    #[test]
    fn child_order_does_not_matter() {
        let now = snap(100.0, Some(11.0), Some(10.0));
        let prev = snap(100.0, Some(9.0), Some(10.0));
        let a = LogicTree::all(vec![cross_above(), close_cmp(CompareOp::Gt, 50.0)]);
        let b = LogicTree::all(vec![close_cmp(CompareOp::Gt, 50.0), cross_above()]);
        assert_eq!(evaluate(&a, &now, Some(&prev)), evaluate(&b, &now, Some(&prev)));
    }
}
