//! Accumulator operators and the tuples extracted from a `$group` stage.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{COUNT_FIELD, FIELD_REF_MARKER};

/// Aggregate operator of a single accumulator.
///
/// `Count` never appears on the wire as an operator: it is what a `$sum`
/// (or any supported operator) over `1` or over an expression object is
/// classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccumulatorOp {
    Sum,
    Min,
    Max,
    Avg,
    Count,
}

impl AccumulatorOp {
    /// Operator name without the marker, as used in generated field names.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccumulatorOp::Sum => "sum",
            AccumulatorOp::Min => "min",
            AccumulatorOp::Max => "max",
            AccumulatorOp::Avg => "avg",
            AccumulatorOp::Count => COUNT_FIELD,
        }
    }

    /// Parse a marked wire operator (`"$sum"`, `"$min"`, `"$max"`, `"$avg"`).
    pub fn from_operator(operator: &str) -> Option<Self> {
        match operator.strip_prefix(FIELD_REF_MARKER)? {
            "sum" => Some(AccumulatorOp::Sum),
            "min" => Some(AccumulatorOp::Min),
            "max" => Some(AccumulatorOp::Max),
            "avg" => Some(AccumulatorOp::Avg),
            _ => None,
        }
    }

    /// Marked wire operator. Counts are expressed as `$sum`.
    pub fn operator(&self) -> String {
        match self {
            AccumulatorOp::Count => format!("{}sum", FIELD_REF_MARKER),
            other => format!("{}{}", FIELD_REF_MARKER, other.as_str()),
        }
    }
}

impl fmt::Display for AccumulatorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(output field, operator, source measure)` for one accumulator.
///
/// For counts the measure is the `count` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatorTuple {
    pub output_field: String,
    pub op: AccumulatorOp,
    pub measure: String,
}

impl AccumulatorTuple {
    pub fn new(
        output_field: impl Into<String>,
        op: AccumulatorOp,
        measure: impl Into<String>,
    ) -> Self {
        Self {
            output_field: output_field.into(),
            op,
            measure: measure.into(),
        }
    }

    pub fn count(output_field: impl Into<String>) -> Self {
        Self::new(output_field, AccumulatorOp::Count, COUNT_FIELD)
    }

    pub fn is_count(&self) -> bool {
        self.op == AccumulatorOp::Count
    }
}
