pub mod accumulator;
pub mod pipeline;

pub use accumulator::{AccumulatorOp, AccumulatorTuple};
pub use pipeline::{document_to_value, Document, GroupStage, Pipeline, Stage};

/// Prefix that marks stage kinds, operators and field references.
pub const FIELD_REF_MARKER: char = '$';

/// Grouping key field of a `$group` stage.
pub const ID_FIELD: &str = "_id";

/// Per-group document count stored on every cube row.
/// Also the sentinel measure of count accumulators.
pub const COUNT_FIELD: &str = "count";

pub const GROUP_STAGE: &str = "$group";
pub const PROJECT_STAGE: &str = "$project";
pub const SET_STAGE: &str = "$set";
pub const OUT_STAGE: &str = "$out";

/// Build a field reference (`"$name"`) for a field or dotted path.
pub fn field_ref(path: &str) -> String {
    format!("{}{}", FIELD_REF_MARKER, path)
}

/// Strip the marker from a direct field reference.
///
/// Returns `None` for anything that is not a reference, including the bare
/// marker and `$$` variables.
pub fn strip_field_ref(value: &str) -> Option<&str> {
    let path = value.strip_prefix(FIELD_REF_MARKER)?;
    if path.is_empty() || path.starts_with(FIELD_REF_MARKER) {
        None
    } else {
        Some(path)
    }
}

/// Errors raised while validating or parsing query pipelines.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("Pipeline must start with a $group stage, found: {found}")]
    NotAGroupPipeline { found: String },

    #[error("Unsupported operator {operator} on field {field} (supported: $sum, $min, $max, $avg)")]
    UnsupportedOperator { field: String, operator: String },

    #[error("Invalid operand for field {field}: expected a field reference or a count pattern, got {operand}")]
    InvalidOperand { field: String, operand: String },

    #[error("Malformed accumulator on field {field}: {reason}")]
    MalformedAccumulator { field: String, reason: String },

    #[error("Malformed {kind} stage: {reason}")]
    MalformedStage { kind: String, reason: String },
}

/// Errors raised while validating a cube definition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DefinitionError {
    #[error("Cube {target} has no dimensions")]
    NoDimensions { target: String },

    #[error("Dimension {name} is listed more than once")]
    DuplicateDimension { name: String },

    #[error("Measure {name} is listed more than once")]
    DuplicateMeasure { name: String },

    #[error("Dimension {name} encodes to group key {key}, which is already taken by {other}")]
    GroupKeyCollision {
        name: String,
        key: String,
        other: String,
    },

    #[error("{name} overlaps the reserved cube field {field}")]
    ReservedField { name: String, field: String },

    #[error("{name} and {other} map to overlapping cube row fields")]
    FieldPathCollision { name: String, other: String },
}
