//! Compatibility check for query pipelines.
//!
//! A query can be answered from a cube when its first stage is a `$group`
//! whose accumulators all use `$sum`, `$min`, `$max` or `$avg` over either a
//! direct field reference or a count pattern (`1` or an expression object).

use cube_api::{
    strip_field_ref, AccumulatorOp, AccumulatorTuple, Pipeline, PipelineError, Stage, ID_FIELD,
};
use serde_json::Value;
use tracing::debug;

/// Validate `pipeline` and extract one tuple per accumulator, in field order.
pub fn check_compatibility(pipeline: &Pipeline) -> Result<Vec<AccumulatorTuple>, PipelineError> {
    let group = match pipeline.first() {
        Some(Stage::Group(group)) => group,
        Some(stage) => {
            return Err(PipelineError::NotAGroupPipeline {
                found: stage.kind().to_string(),
            })
        }
        None => {
            return Err(PipelineError::NotAGroupPipeline {
                found: "empty pipeline".to_string(),
            })
        }
    };

    // Scan a copy so the caller's stage keeps its `_id`.
    let mut accumulators = group.body().clone();
    accumulators.shift_remove(ID_FIELD);

    let tuples = accumulators
        .iter()
        .map(|(field, accumulator)| classify(field, accumulator))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        stages = pipeline.len(),
        accumulators = tuples.len(),
        "Pipeline is cube-compatible"
    );

    Ok(tuples)
}

fn classify(field: &str, accumulator: &Value) -> Result<AccumulatorTuple, PipelineError> {
    let (operator, operand) = single_operator(field, accumulator)?;

    let op = AccumulatorOp::from_operator(operator).ok_or_else(|| {
        PipelineError::UnsupportedOperator {
            field: field.to_string(),
            operator: operator.to_string(),
        }
    })?;

    if is_count_operand(operand) {
        return Ok(AccumulatorTuple::count(field));
    }

    match operand.as_str().and_then(strip_field_ref) {
        Some(measure) => Ok(AccumulatorTuple::new(field, op, measure)),
        None => Err(PipelineError::InvalidOperand {
            field: field.to_string(),
            operand: operand.to_string(),
        }),
    }
}

fn single_operator<'a>(
    field: &str,
    accumulator: &'a Value,
) -> Result<(&'a str, &'a Value), PipelineError> {
    let malformed = |reason: String| PipelineError::MalformedAccumulator {
        field: field.to_string(),
        reason,
    };

    let object = accumulator
        .as_object()
        .ok_or_else(|| malformed(format!("expected {{<operator>: <operand>}}, got {}", accumulator)))?;

    let mut entries = object.iter();
    match (entries.next(), entries.next()) {
        (Some((operator, operand)), None) => Ok((operator.as_str(), operand)),
        _ => Err(malformed(format!(
            "expected exactly one operator, found {}",
            object.len()
        ))),
    }
}

/// Expression objects (e.g. `$cond`) and the literal `1` count documents,
/// whatever the nominal operator.
fn is_count_operand(operand: &Value) -> bool {
    operand.is_object() || operand.as_f64() == Some(1.0)
}
