//! Rewrites a validated query pipeline to read from a cube.
//!
//! The leading `$group` is replaced by one that re-aggregates the cube's
//! pre-aggregated fields. `sum`, `min` and `max` re-apply the same operator to
//! the stored value of that operator. Averages are re-derived from the stored
//! sums and truthy counts in a `$set` stage, guarded against zero counts. A
//! `$project` then restores the output field names of the original group, so
//! every later stage runs unchanged.

use cube_api::{
    AccumulatorOp, AccumulatorTuple, GroupStage, Pipeline, Stage, COUNT_FIELD, ID_FIELD,
};
use serde_json::Value;
use tracing::debug;

use crate::expr::{accumulator, reference, safe_divide};
use crate::fields::FieldBuilder;

fn stored_field(measure: &str, op: AccumulatorOp) -> String {
    format!("{}.{}", measure, op.as_str())
}

fn computed_field(measure: &str, op: AccumulatorOp) -> String {
    format!("{}_{}", measure, op.as_str())
}

/// Build the cube-side equivalent of `pipeline`.
///
/// `tuples` must come from [`crate::check_compatibility`] on the same pipeline.
pub fn rewrite_pipeline(pipeline: &Pipeline, tuples: &[AccumulatorTuple]) -> Pipeline {
    let mut group = FieldBuilder::new();
    let mut averages = FieldBuilder::new();
    let mut projection = FieldBuilder::new();
    projection.insert(ID_FIELD, 1);

    for tuple in tuples {
        let measure = tuple.measure.as_str();
        let output = match tuple.op {
            AccumulatorOp::Count => {
                group.insert_once(
                    COUNT_FIELD,
                    accumulator(AccumulatorOp::Sum, reference(COUNT_FIELD)),
                );
                COUNT_FIELD.to_string()
            }
            AccumulatorOp::Avg => {
                let sum = computed_field(measure, AccumulatorOp::Sum);
                let count = computed_field(measure, AccumulatorOp::Count);
                group.insert_once(
                    sum.as_str(),
                    accumulator(
                        AccumulatorOp::Sum,
                        reference(&stored_field(measure, AccumulatorOp::Sum)),
                    ),
                );
                group.insert_once(
                    count.as_str(),
                    accumulator(
                        AccumulatorOp::Sum,
                        reference(&stored_field(measure, AccumulatorOp::Count)),
                    ),
                );

                let avg = computed_field(measure, AccumulatorOp::Avg);
                averages.insert_once(avg.as_str(), safe_divide(reference(&sum), reference(&count)));
                avg
            }
            op @ (AccumulatorOp::Sum | AccumulatorOp::Min | AccumulatorOp::Max) => {
                let field = computed_field(measure, op);
                group.insert_once(
                    field.as_str(),
                    accumulator(op, reference(&stored_field(measure, op))),
                );
                field
            }
        };
        projection.insert(tuple.output_field.as_str(), reference(&output));
    }

    let id = pipeline
        .first()
        .and_then(Stage::as_group)
        .map(|original| original.id().clone())
        .unwrap_or(Value::Null);

    let mut stages = Vec::with_capacity(pipeline.len() + 2);
    stages.push(Stage::Group(GroupStage::new(id, group.into_document())));
    if !averages.is_empty() {
        stages.push(Stage::Set(averages.into_document()));
    }
    stages.push(Stage::Project(projection.into_document()));
    stages.extend(pipeline.iter().skip(1).cloned());

    debug!(
        accumulators = tuples.len(),
        original_stages = pipeline.len(),
        rewritten_stages = stages.len(),
        "Rewrote pipeline for cube"
    );

    Pipeline::new(stages)
}
