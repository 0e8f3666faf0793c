//! JSON strategy documents.
//!
//! A document is deserialized into loose DTOs first and then converted, once,
//! into a validated [`CompositeStrategy`]. Every conversion error carries the
//! dotted path of the offending node.
//!
//! ```json
//! {
//!   "name": "golden_cross",
//!   "entry": {"type": "leaf", "signal": {
//!       "indicator": "SMA", "parameters": {"period": 50},
//!       "condition": {"operator": "cross_above",
//!                     "rhs": {"indicator": "SMA", "parameters": {"period": 200}}}}},
//!   "exit": {"type": "branch", "operator": "OR", "children": [...]},
//!   "regime_filter": ["TREND_UP"]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use crate::domain::error::{RegimeTraderError, StrategyError};
use crate::domain::indicator::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use crate::domain::indicator::{IndicatorField, IndicatorRef, IndicatorType};
use crate::domain::logic_tree::{CompareOp, Condition, LogicOperator, LogicTree, Operand, Signal};
use crate::domain::regime::SimplifiedRegime;
use crate::domain::strategy::{CompositeStrategy, SubRegimeFilter};

#[derive(Debug, Deserialize)]
struct StrategyDoc {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(alias = "entry_logic")]
    entry: NodeDoc,
    #[serde(alias = "exit_logic")]
    exit: NodeDoc,
    #[serde(default)]
    regime_filter: Option<Vec<String>>,
    #[serde(default)]
    sub_regime_filter: Option<SubRegimeDoc>,
    #[serde(default)]
    regime_gates_exits: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct NodeDoc {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    signal: Option<SignalDoc>,
    #[serde(default)]
    operator: Option<String>,
    #[serde(default)]
    children: Vec<NodeDoc>,
}

#[derive(Debug, Deserialize)]
struct SignalDoc {
    #[serde(default)]
    name: Option<String>,
    #[serde(flatten)]
    operand: OperandDoc,
    condition: ConditionDoc,
    #[serde(default)]
    timeframe: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperandDoc {
    indicator: String,
    #[serde(default)]
    parameters: BTreeMap<String, f64>,
    #[serde(default, alias = "indicator_component")]
    component: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RhsDoc {
    Number(f64),
    Operand(OperandDoc),
}

#[derive(Debug, Deserialize)]
struct ConditionDoc {
    operator: String,
    #[serde(default)]
    threshold: Option<f64>,
    #[serde(default)]
    threshold2: Option<f64>,
    #[serde(default)]
    rhs: Option<RhsDoc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SubRegimeDoc {
    #[serde(default)]
    trend: Option<Vec<String>>,
    #[serde(default)]
    volatility: Option<Vec<String>>,
    #[serde(default)]
    momentum: Option<Vec<String>>,
}

/// Read and convert a strategy file.
pub fn load_strategy(path: impl AsRef<Path>) -> Result<CompositeStrategy, RegimeTraderError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let strategy = parse_strategy(&content)?;
    debug!(path = %path.display(), name = %strategy.name, "strategy loaded");
    Ok(strategy)
}

pub fn parse_strategy(json: &str) -> Result<CompositeStrategy, StrategyError> {
    let doc: StrategyDoc =
        serde_json::from_str(json).map_err(|e| StrategyError::new("document", e.to_string()))?;
    convert_strategy(doc)
}

fn convert_strategy(doc: StrategyDoc) -> Result<CompositeStrategy, StrategyError> {
    let entry = convert_node(&doc.entry, "entry")?;
    let exit = convert_node(&doc.exit, "exit")?;
    let mut strategy = CompositeStrategy::new(doc.name, entry, exit)?.with_description(doc.description);

    if let Some(names) = &doc.regime_filter {
        strategy = strategy.with_regime_filter(parse_names::<SimplifiedRegime>(names, "regime_filter")?);
    }
    if let Some(sub) = &doc.sub_regime_filter {
        let filter = SubRegimeFilter {
            trend: parse_axis(&sub.trend, "sub_regime_filter.trend")?,
            volatility: parse_axis(&sub.volatility, "sub_regime_filter.volatility")?,
            momentum: parse_axis(&sub.momentum, "sub_regime_filter.momentum")?,
        };
        strategy = strategy.with_sub_regime_filter(filter);
    }
    if let Some(gates) = doc.regime_gates_exits {
        strategy = strategy.with_regime_gates_exits(gates);
    }
    Ok(strategy)
}

fn parse_names<T>(names: &[String], path: &str) -> Result<BTreeSet<T>, StrategyError>
where
    T: FromStr<Err = String> + Ord,
{
    names
        .iter()
        .enumerate()
        .map(|(i, name)| T::from_str(name).map_err(|reason| StrategyError::new(format!("{}[{}]", path, i), reason)))
        .collect()
}

fn parse_axis<T>(names: &Option<Vec<String>>, path: &str) -> Result<Option<BTreeSet<T>>, StrategyError>
where
    T: FromStr<Err = String> + Ord,
{
    names.as_deref().map(|n| parse_names(n, path)).transpose()
}

fn convert_node(node: &NodeDoc, path: &str) -> Result<LogicTree, StrategyError> {
    match node.kind.to_ascii_lowercase().as_str() {
        "leaf" => {
            let signal = node
                .signal
                .as_ref()
                .ok_or_else(|| StrategyError::new(format!("{}.signal", path), "leaf node has no signal"))?;
            Ok(LogicTree::Leaf(convert_signal(signal, &format!("{}.signal", path))?))
        }
        "branch" => {
            let op_path = format!("{}.operator", path);
            let operator = match node.operator.as_deref().map(str::to_ascii_uppercase).as_deref() {
                Some("AND") => LogicOperator::And,
                Some("OR") => LogicOperator::Or,
                Some(other) => {
                    return Err(StrategyError::new(op_path, format!("unknown logic operator '{}'", other)));
                }
                None => return Err(StrategyError::new(op_path, "branch node has no operator")),
            };
            let children = node
                .children
                .iter()
                .enumerate()
                .map(|(i, child)| convert_node(child, &format!("{}.children[{}]", path, i)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(LogicTree::Composite { operator, children })
        }
        other => Err(StrategyError::new(
            format!("{}.type", path),
            format!("unknown node type '{}' (expected leaf or branch)", other),
        )),
    }
}

fn convert_signal(doc: &SignalDoc, path: &str) -> Result<Signal, StrategyError> {
    let lhs = convert_operand(&doc.operand, path)?;
    let cond_path = format!("{}.condition", path);
    let condition = convert_condition(&doc.condition, &cond_path)?;
    let name = doc.name.clone().unwrap_or_else(|| lhs.to_string());
    let signal = Signal::new(name, lhs, condition);
    match doc.timeframe.as_deref().map(str::trim) {
        Some("") => Err(StrategyError::new(format!("{}.timeframe", path), "timeframe is empty")),
        Some(tf) => Ok(signal.with_timeframe(tf)),
        None => Ok(signal),
    }
}

fn convert_condition(doc: &ConditionDoc, path: &str) -> Result<Condition, StrategyError> {
    let operator = doc.operator.trim().to_ascii_lowercase();
    let compare = match operator.as_str() {
        "<" => Some(CompareOp::Lt),
        ">" => Some(CompareOp::Gt),
        "<=" => Some(CompareOp::Le),
        ">=" => Some(CompareOp::Ge),
        "==" => Some(CompareOp::Eq),
        "!=" => Some(CompareOp::Ne),
        _ => None,
    };
    if let Some(op) = compare {
        return Ok(Condition::Compare {
            op,
            rhs: convert_rhs(doc, path)?,
        });
    }

    match operator.as_str() {
        "cross_above" => Ok(Condition::CrossAbove(convert_rhs(doc, path)?)),
        "cross_below" => Ok(Condition::CrossBelow(convert_rhs(doc, path)?)),
        "between" | "outside" => {
            let (lower, upper) = match (doc.threshold, doc.threshold2) {
                (Some(lower), Some(upper)) => (lower, upper),
                (None, _) => {
                    return Err(StrategyError::new(format!("{}.threshold", path), format!("{} requires threshold", operator)));
                }
                (_, None) => {
                    return Err(StrategyError::new(format!("{}.threshold2", path), format!("{} requires threshold2", operator)));
                }
            };
            if operator == "between" {
                Ok(Condition::Between { lower, upper })
            } else {
                Ok(Condition::Outside { lower, upper })
            }
        }
        _ => Err(StrategyError::new(
            format!("{}.operator", path),
            format!("unknown operator '{}'", doc.operator),
        )),
    }
}

fn convert_rhs(doc: &ConditionDoc, path: &str) -> Result<Operand, StrategyError> {
    match (&doc.rhs, doc.threshold) {
        (Some(RhsDoc::Number(v)), _) => Ok(Operand::Constant(*v)),
        (Some(RhsDoc::Operand(op)), _) => convert_operand(op, &format!("{}.rhs", path)),
        (None, Some(v)) => Ok(Operand::Constant(v)),
        (None, None) => Err(StrategyError::new(
            format!("{}.threshold", path),
            format!("operator '{}' needs a threshold or rhs", doc.operator),
        )),
    }
}

fn convert_operand(doc: &OperandDoc, path: &str) -> Result<Operand, StrategyError> {
    let name = doc.indicator.trim().to_ascii_uppercase();
    let price = match name.as_str() {
        "OPEN" => Some(Operand::Open),
        "HIGH" => Some(Operand::High),
        "LOW" => Some(Operand::Low),
        "CLOSE" | "PRICE" => Some(Operand::Close),
        "VOLUME" => Some(Operand::Volume),
        _ => None,
    };
    if let Some(operand) = price {
        if doc.component.is_some() {
            return Err(StrategyError::new(
                format!("{}.component", path),
                format!("{} has no components", name),
            ));
        }
        return Ok(operand);
    }

    let params = Params {
        values: &doc.parameters,
        path: format!("{}.parameters", path),
    };
    let indicator_type = match name.as_str() {
        "SMA" => IndicatorType::Sma(params.period("period", 20)?),
        "EMA" => IndicatorType::Ema(params.period("period", 20)?),
        "RSI" => IndicatorType::Rsi(params.period("period", 14)?),
        "ROC" => IndicatorType::Roc(params.period("period", 10)?),
        "ATR" => IndicatorType::Atr(params.period("period", 14)?),
        "ADX" => IndicatorType::Adx(params.period("period", 14)?),
        "MACD" => IndicatorType::Macd {
            fast: params.period("fast", DEFAULT_FAST)?,
            slow: params.period("slow", DEFAULT_SLOW)?,
            signal: params.period("signal", DEFAULT_SIGNAL)?,
        },
        "BB" | "BOLLINGER" => {
            let mult = ["num_std", "std_dev", "stddev"]
                .iter()
                .find_map(|k| doc.parameters.get(*k).copied())
                .unwrap_or(2.0);
            IndicatorType::bollinger(params.period("period", 20)?, mult)
        }
        "VWAP" => IndicatorType::Vwap,
        _ => {
            return Err(StrategyError::new(
                format!("{}.indicator", path),
                format!("unknown indicator '{}'", doc.indicator),
            ));
        }
    };

    let field = match doc.component.as_deref() {
        None => indicator_type.default_field(),
        Some(component) => parse_component(component)
            .filter(|f| indicator_type.supports_field(*f))
            .ok_or_else(|| {
                StrategyError::new(
                    format!("{}.component", path),
                    format!("{} has no '{}' component", indicator_type, component),
                )
            })?,
    };
    Ok(Operand::Indicator(IndicatorRef::with_field(indicator_type, field)))
}

fn parse_component(component: &str) -> Option<IndicatorField> {
    let field = match component.trim().to_ascii_lowercase().as_str() {
        "value" => IndicatorField::Value,
        "macd" | "line" => IndicatorField::MacdLine,
        "signal" => IndicatorField::MacdSignal,
        "histogram" | "hist" => IndicatorField::MacdHistogram,
        "upper" => IndicatorField::BollingerUpper,
        "middle" => IndicatorField::BollingerMiddle,
        "lower" => IndicatorField::BollingerLower,
        "width" => IndicatorField::BollingerWidth,
        _ => return None,
    };
    Some(field)
}

struct Params<'a> {
    values: &'a BTreeMap<String, f64>,
    path: String,
}

impl Params<'_> {
    /// A whole-number period, or `default` when absent. Zero is left for
    /// indicator validation to reject.
    fn period(&self, key: &str, default: usize) -> Result<usize, StrategyError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(&v) if v >= 0.0 && v.fract() == 0.0 && v.is_finite() => Ok(v as usize),
            Some(&v) => Err(StrategyError::new(
                format!("{}.{}", self.path, key),
                format!("{} must be a non-negative whole number, got {}", key, v),
            )),
        }
    }
}
