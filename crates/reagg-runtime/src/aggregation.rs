//! Aggregation operators for incremental window aggregation.
//!
//! An operator is split into three steps so that partial results can be
//! kept in the aggregation tree and merged in any grouping:
//!
//! - `lift` turns one event into a partial aggregate
//! - `combine` merges two partials (associative, not necessarily commutative)
//! - `lower` turns a partial into the reported value
//!
//! # Available Operators
//!
//! | Operator | Name | Partial | Result |
//! |----------|------|---------|--------|
//! | [`Count`] | `COUNT` | `u64` | `Int` |
//! | [`Sum`] | `SUM` | `f64` | `Float` |
//! | [`Avg`] | `AVG` | [`AvgPartial`] | `Float` or `Null` |
//! | [`Min`] | `MIN` | `Option<f64>` | `Float` or `Null` |
//! | [`Max`] | `MAX` | `Option<f64>` | `Float` or `Null` |
//! | [`ArgMax`] | `ARG_MAX` | [`ArgMaxPartial`] | the arg field's value |
//!
//! # Example
//!
//! ```
//! use reagg_core::Value;
//! use reagg_runtime::aggregation::{Max, Operator};
//! use reagg_runtime::Event;
//!
//! let events = vec![
//!     Event::new("Reading").with_field("value", 10.0),
//!     Event::new("Reading").with_field("value", 30.0),
//!     Event::new("Reading").with_field("value", 20.0),
//! ];
//!
//! let max = Max::new("value");
//! assert_eq!(max.apply(&events), Value::Float(30.0));
//! ```

use crate::event::Event;
use reagg_core::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Field aggregated by the numeric operators when none is configured.
pub const DEFAULT_FIELD: &str = "value";

/// Lift/combine/lower contract for an incremental aggregation.
///
/// `combine` must be associative. It is always called with the partial
/// covering earlier events as `left`, so operators may break ties by side.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: the aggregator is shared between
/// the producer and timer tasks.
pub trait Operator: Send + Sync + 'static {
    /// Partial aggregate stored in the tree leaves and inner nodes.
    type Partial: Clone + fmt::Debug + Send + Sync + 'static;

    /// Name reported alongside results (e.g. `COUNT`).
    fn name(&self) -> &str;

    fn lift(&self, event: &Event) -> Self::Partial;

    fn combine(&self, left: &Self::Partial, right: &Self::Partial) -> Self::Partial;

    fn lower(&self, partial: &Self::Partial) -> Value;

    /// Result reported for a window holding no events.
    fn empty_value(&self) -> Value {
        Value::Null
    }

    /// Aggregate a slice of events from scratch.
    ///
    /// Folds left to right, so it gives the same result as the tree for the
    /// same events in the same order.
    fn apply(&self, events: &[Event]) -> Value {
        let mut iter = events.iter();
        let Some(first) = iter.next() else {
            return self.empty_value();
        };
        let folded = iter.fold(self.lift(first), |acc, event| {
            self.combine(&acc, &self.lift(event))
        });
        self.lower(&folded)
    }
}

/// Number of events
#[derive(Debug, Clone, Copy, Default)]
pub struct Count;

impl Operator for Count {
    type Partial = u64;

    fn name(&self) -> &str {
        "COUNT"
    }

    fn lift(&self, _event: &Event) -> u64 {
        1
    }

    fn combine(&self, left: &u64, right: &u64) -> u64 {
        left + right
    }

    fn lower(&self, partial: &u64) -> Value {
        Value::Int(*partial as i64)
    }

    fn empty_value(&self) -> Value {
        Value::Int(0)
    }
}

/// Sum of a numeric field; missing or NaN values count as zero.
#[derive(Debug, Clone)]
pub struct Sum {
    field: String,
}

impl Sum {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl Operator for Sum {
    type Partial = f64;

    fn name(&self) -> &str {
        "SUM"
    }

    fn lift(&self, event: &Event) -> f64 {
        numeric(event, &self.field).unwrap_or(0.0)
    }

    fn combine(&self, left: &f64, right: &f64) -> f64 {
        left + right
    }

    fn lower(&self, partial: &f64) -> Value {
        Value::Float(*partial)
    }

    fn empty_value(&self) -> Value {
        Value::Float(0.0)
    }
}

/// Running sum and count for [`Avg`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AvgPartial {
    pub sum: f64,
    pub count: u64,
}

/// Mean of a numeric field, ignoring events where it is missing.
#[derive(Debug, Clone)]
pub struct Avg {
    field: String,
}

impl Avg {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl Operator for Avg {
    type Partial = AvgPartial;

    fn name(&self) -> &str {
        "AVG"
    }

    fn lift(&self, event: &Event) -> AvgPartial {
        match numeric(event, &self.field) {
            Some(v) => AvgPartial { sum: v, count: 1 },
            None => AvgPartial::default(),
        }
    }

    fn combine(&self, left: &AvgPartial, right: &AvgPartial) -> AvgPartial {
        AvgPartial {
            sum: left.sum + right.sum,
            count: left.count + right.count,
        }
    }

    fn lower(&self, partial: &AvgPartial) -> Value {
        if partial.count == 0 {
            Value::Null
        } else {
            Value::Float(partial.sum / partial.count as f64)
        }
    }
}

/// Minimum of a numeric field
#[derive(Debug, Clone)]
pub struct Min {
    field: String,
}

impl Min {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl Operator for Min {
    type Partial = Option<f64>;

    fn name(&self) -> &str {
        "MIN"
    }

    fn lift(&self, event: &Event) -> Option<f64> {
        numeric(event, &self.field)
    }

    fn combine(&self, left: &Option<f64>, right: &Option<f64>) -> Option<f64> {
        match (left, right) {
            (Some(l), Some(r)) => Some(l.min(*r)),
            (Some(v), None) | (None, Some(v)) => Some(*v),
            (None, None) => None,
        }
    }

    fn lower(&self, partial: &Option<f64>) -> Value {
        partial.map_or(Value::Null, Value::Float)
    }
}

/// Maximum of a numeric field
#[derive(Debug, Clone)]
pub struct Max {
    field: String,
}

impl Max {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl Operator for Max {
    type Partial = Option<f64>;

    fn name(&self) -> &str {
        "MAX"
    }

    fn lift(&self, event: &Event) -> Option<f64> {
        numeric(event, &self.field)
    }

    fn combine(&self, left: &Option<f64>, right: &Option<f64>) -> Option<f64> {
        match (left, right) {
            (Some(l), Some(r)) => Some(l.max(*r)),
            (Some(v), None) | (None, Some(v)) => Some(*v),
            (None, None) => None,
        }
    }

    fn lower(&self, partial: &Option<f64>) -> Value {
        partial.map_or(Value::Null, Value::Float)
    }
}

/// Candidate carried by [`ArgMax`]: the arg of the best event so far and the
/// value it was ranked by.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgMaxPartial {
    pub arg: Value,
    pub value: Option<f64>,
}

/// Value of `arg` on the event with the largest `max_over`.
///
/// Ties on `max_over` go to the larger `arg` under [`Value::total_cmp`], so the
/// result does not depend on how partials are grouped. Events missing
/// `max_over` rank below every other event.
#[derive(Debug, Clone)]
pub struct ArgMax {
    arg: String,
    max_over: String,
}

impl ArgMax {
    pub fn new(arg: impl Into<String>, max_over: impl Into<String>) -> Self {
        Self {
            arg: arg.into(),
            max_over: max_over.into(),
        }
    }
}

impl Operator for ArgMax {
    type Partial = ArgMaxPartial;

    fn name(&self) -> &str {
        "ARG_MAX"
    }

    fn lift(&self, event: &Event) -> ArgMaxPartial {
        ArgMaxPartial {
            arg: event.get(&self.arg).cloned().unwrap_or_default(),
            value: numeric(event, &self.max_over),
        }
    }

    fn combine(&self, left: &ArgMaxPartial, right: &ArgMaxPartial) -> ArgMaxPartial {
        let by_value = match (left.value, right.value) {
            (Some(l), Some(r)) => l.total_cmp(&r),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        let left_wins = match by_value {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => left.arg.total_cmp(&right.arg) == Ordering::Greater,
        };
        if left_wins {
            left.clone()
        } else {
            right.clone()
        }
    }

    fn lower(&self, partial: &ArgMaxPartial) -> Value {
        partial.arg.clone()
    }
}

/// Numeric field value, treating NaN as missing.
fn numeric(event: &Event, field: &str) -> Option<f64> {
    event.get_float(field).filter(|v| !v.is_nan())
}

/// Operator selection used by configuration files and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    #[default]
    Count,
    Sum,
    Avg,
    Min,
    Max,
    ArgMax,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 6] = [
        OperatorKind::Count,
        OperatorKind::Sum,
        OperatorKind::Avg,
        OperatorKind::Min,
        OperatorKind::Max,
        OperatorKind::ArgMax,
    ];

    /// Configuration spelling (`count`, `arg_max`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorKind::Count => "count",
            OperatorKind::Sum => "sum",
            OperatorKind::Avg => "avg",
            OperatorKind::Min => "min",
            OperatorKind::Max => "max",
            OperatorKind::ArgMax => "arg_max",
        }
    }

    /// Whether the operator reads the configured field at all.
    pub fn uses_field(&self) -> bool {
        !matches!(self, OperatorKind::Count)
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        OperatorKind::ALL
            .into_iter()
            .find(|kind| {
                kind.as_str() == normalized || normalized == kind.as_str().replace('_', "")
            })
            .ok_or_else(|| {
                format!(
                    "unknown operator '{}' (expected one of: count, sum, avg, min, max, arg_max)",
                    s
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_events() -> Vec<Event> {
        vec![
            Event::new("Test").with_field("value", 10.0),
            Event::new("Test").with_field("value", 20.0),
            Event::new("Test").with_field("value", 30.0),
        ]
    }

    #[test]
    fn test_count() {
        let events = make_events();
        assert_eq!(Count.apply(&events), Value::Int(3));
        assert_eq!(Count.apply(&[]), Value::Int(0));
        assert_eq!(Count.name(), "COUNT");
    }

    #[test]
    fn test_sum() {
        let events = make_events();
        assert_eq!(Sum::new("value").apply(&events), Value::Float(60.0));
        assert_eq!(Sum::new("value").apply(&[]), Value::Float(0.0));
    }

    #[test]
    fn test_sum_ignores_missing_and_nan() {
        let events = vec![
            Event::new("Test").with_field("value", 5i64),
            Event::new("Test").with_field("other", 100i64),
            Event::new("Test").with_field("value", f64::NAN),
        ];
        assert_eq!(Sum::new("value").apply(&events), Value::Float(5.0));
    }

    #[test]
    fn test_avg() {
        let events = make_events();
        assert_eq!(Avg::new("value").apply(&events), Value::Float(20.0));
    }

    #[test]
    fn test_avg_skips_missing_fields() {
        let events = vec![
            Event::new("Test").with_field("value", 4.0),
            Event::new("Test"),
            Event::new("Test").with_field("value", 8.0),
        ];
        assert_eq!(Avg::new("value").apply(&events), Value::Float(6.0));

        let none = vec![Event::new("Test")];
        assert_eq!(Avg::new("value").apply(&none), Value::Null);
    }

    #[test]
    fn test_min_max() {
        let events = make_events();
        assert_eq!(Min::new("value").apply(&events), Value::Float(10.0));
        assert_eq!(Max::new("value").apply(&events), Value::Float(30.0));
    }

    #[test]
    fn test_min_max_with_nothing_seen() {
        let events = vec![Event::new("Test").with_field("other", 1i64)];
        assert_eq!(Min::new("value").apply(&events), Value::Null);
        assert_eq!(Max::new("value").apply(&events), Value::Null);
        assert_eq!(Max::new("value").apply(&[]), Value::Null);
    }

    #[test]
    fn test_min_identity() {
        let min = Min::new("value");
        assert_eq!(min.combine(&None, &Some(3.0)), Some(3.0));
        assert_eq!(min.combine(&Some(3.0), &None), Some(3.0));
        assert_eq!(min.combine(&None, &None), None);
    }

    fn reading(id: i64, value: i64) -> Event {
        Event::new("Reading")
            .with_field("id", id)
            .with_field("value", value)
    }

    #[test]
    fn test_arg_max_picks_highest_value() {
        let events = vec![reading(1, 10), reading(2, 50), reading(3, 20)];
        assert_eq!(ArgMax::new("id", "value").apply(&events), Value::Int(2));
    }

    #[test]
    fn test_arg_max_tie_prefers_higher_arg() {
        let op = ArgMax::new("id", "value");
        let low = op.lift(&reading(1, 50));
        let high = op.lift(&reading(9, 50));
        assert_eq!(op.combine(&low, &high).arg, Value::Int(9));
        assert_eq!(op.combine(&high, &low).arg, Value::Int(9));
    }

    #[test]
    fn test_arg_max_mixed_type_tie_is_grouping_independent() {
        let op = ArgMax::new("id", "value");
        let tied = |arg: Value| ArgMaxPartial {
            arg,
            value: Some(1.0),
        };
        let (a, b, c) = (
            tied(Value::Str("b".into())),
            tied(Value::Int(4)),
            tied(Value::Str("a".into())),
        );

        let left_assoc = op.combine(&op.combine(&a, &b), &c);
        let right_assoc = op.combine(&a, &op.combine(&b, &c));
        assert_eq!(left_assoc, right_assoc);
        assert_eq!(op.lower(&left_assoc), Value::Str("b".into()));
        assert_eq!(op.combine(&b, &a), op.combine(&a, &b));
    }

    #[test]
    fn test_arg_max_missing_value_ranks_last() {
        let op = ArgMax::new("id", "value");
        let missing = op.lift(&Event::new("Reading").with_field("id", 100i64));
        let present = op.lift(&reading(1, -5));
        assert_eq!(op.combine(&missing, &present).arg, Value::Int(1));
        assert_eq!(op.combine(&present, &missing).arg, Value::Int(1));
    }

    #[test]
    fn test_arg_max_is_associative_on_sample() {
        let op = ArgMax::new("id", "value");
        let parts: Vec<_> = [(1, 3), (2, 7), (3, 7), (4, 1)]
            .iter()
            .map(|&(id, v)| op.lift(&reading(id, v)))
            .collect();
        let left_assoc = op.combine(&op.combine(&parts[0], &parts[1]), &parts[2]);
        let right_assoc = op.combine(&parts[0], &op.combine(&parts[1], &parts[2]));
        assert_eq!(left_assoc, right_assoc);
        assert_eq!(op.lower(&left_assoc), Value::Int(3));
    }

    // ==========================================================================
    // OperatorKind Tests
    // ==========================================================================

    #[test]
    fn test_operator_kind_parse() {
        assert_eq!("count".parse::<OperatorKind>(), Ok(OperatorKind::Count));
        assert_eq!("ARG_MAX".parse::<OperatorKind>(), Ok(OperatorKind::ArgMax));
        assert_eq!("arg-max".parse::<OperatorKind>(), Ok(OperatorKind::ArgMax));
        assert_eq!("argmax".parse::<OperatorKind>(), Ok(OperatorKind::ArgMax));
        assert!("median".parse::<OperatorKind>().is_err());
    }

    #[test]
    fn test_operator_kind_display_roundtrip() {
        for kind in OperatorKind::ALL {
            assert_eq!(kind.to_string().parse::<OperatorKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_operator_kind_serde() {
        let json = serde_json::to_string(&OperatorKind::ArgMax).unwrap();
        assert_eq!(json, "\"arg_max\"");
        let kind: OperatorKind = serde_json::from_str("\"avg\"").unwrap();
        assert_eq!(kind, OperatorKind::Avg);
    }
}
