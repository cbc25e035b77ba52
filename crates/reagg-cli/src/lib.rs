//! reagg CLI library - testable functions and modules
//!
//! Configuration loading lives here so it can be exercised without the
//! binary; `main.rs` only wires it to the runtime.

pub mod config;

use reagg_runtime::aggregation::{ArgMax, Avg, Count, Max, Min, Sum};
use reagg_runtime::OperatorKind;

use config::AggregatorSection;

/// Describe the configured operator, e.g. `AVG(value)` or `ARG_MAX(id BY value)`.
pub fn describe_operator(section: &AggregatorSection) -> String {
    match section.operator {
        OperatorKind::Count => "COUNT(*)".to_string(),
        OperatorKind::ArgMax => format!("ARG_MAX({} BY {})", section.arg_field, section.field),
        kind => format!("{}({})", kind.as_str().to_uppercase(), section.field),
    }
}

/// Operator instances built from configuration, one per kind.
///
/// The runtime is generic over the operator, so callers match on this and
/// start a pipeline with the concrete type.
pub enum ConfiguredOperator {
    Count(Count),
    Sum(Sum),
    Avg(Avg),
    Min(Min),
    Max(Max),
    ArgMax(ArgMax),
}

impl ConfiguredOperator {
    pub fn from_section(section: &AggregatorSection) -> Self {
        let field = section.field.as_str();
        match section.operator {
            OperatorKind::Count => ConfiguredOperator::Count(Count),
            OperatorKind::Sum => ConfiguredOperator::Sum(Sum::new(field)),
            OperatorKind::Avg => ConfiguredOperator::Avg(Avg::new(field)),
            OperatorKind::Min => ConfiguredOperator::Min(Min::new(field)),
            OperatorKind::Max => ConfiguredOperator::Max(Max::new(field)),
            OperatorKind::ArgMax => {
                ConfiguredOperator::ArgMax(ArgMax::new(section.arg_field.as_str(), field))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reagg_runtime::Operator;

    fn section(operator: OperatorKind) -> AggregatorSection {
        AggregatorSection {
            operator,
            ..Default::default()
        }
    }

    #[test]
    fn test_describe_operator() {
        assert_eq!(describe_operator(&section(OperatorKind::Count)), "COUNT(*)");
        assert_eq!(describe_operator(&section(OperatorKind::Avg)), "AVG(value)");
        assert_eq!(
            describe_operator(&section(OperatorKind::ArgMax)),
            "ARG_MAX(id BY value)"
        );
    }

    #[test]
    fn test_configured_operator_names() {
        for kind in OperatorKind::ALL {
            let name = match ConfiguredOperator::from_section(&section(kind)) {
                ConfiguredOperator::Count(op) => op.name().to_string(),
                ConfiguredOperator::Sum(op) => op.name().to_string(),
                ConfiguredOperator::Avg(op) => op.name().to_string(),
                ConfiguredOperator::Min(op) => op.name().to_string(),
                ConfiguredOperator::Max(op) => op.name().to_string(),
                ConfiguredOperator::ArgMax(op) => op.name().to_string(),
            };
            assert_eq!(name, kind.as_str().to_uppercase());
        }
    }
}
