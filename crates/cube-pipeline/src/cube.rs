//! Cube construction pipeline.
//!
//! A cube holds one row per distinct dimension tuple:
//!
//! ```json
//! {"count": 12, "State": "CA", "Weight": {"sum": 40210, "min": 2100, "max": 5400, "count": 12}}
//! ```
//!
//! The pipeline groups the raw collection by every dimension, accumulates
//! `sum`/`min`/`max`/truthy `count` per measure, reshapes each group into the
//! row above and writes the result to the target collection.

use cube_api::{
    AccumulatorOp, GroupStage, Pipeline, Stage, COUNT_FIELD, ID_FIELD,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::expr::{accumulator, reference, truthy_flag};
use crate::fields::FieldBuilder;

/// Group key field name for a dimension.
///
/// `$group` output keys cannot contain path separators, so `address.city`
/// becomes `address_city`.
pub fn encode_dimension(dimension: &str) -> String {
    dimension.replace('.', "_")
}

fn measure_field(measure: &str, op: AccumulatorOp) -> String {
    format!("{}_{}", measure, op.as_str())
}

/// Build the pipeline that materializes a cube into `target`.
///
/// Stage order is `$group`, `$project`, `$out`. Key order inside each stage
/// follows the order of `dimensions` and `measures`. Inputs are not validated;
/// see [`crate::CubeDefinition::validate`].
pub fn build_cube_pipeline<D, M>(dimensions: &[D], measures: &[M], target: &str) -> Pipeline
where
    D: AsRef<str>,
    M: AsRef<str>,
{
    let mut id = FieldBuilder::new();
    for dimension in dimensions {
        let dimension = dimension.as_ref();
        id.insert(encode_dimension(dimension), reference(dimension));
    }

    let mut group = FieldBuilder::new();
    group.insert(COUNT_FIELD, accumulator(AccumulatorOp::Sum, json!(1)));
    for measure in measures {
        let measure = measure.as_ref();
        for op in [AccumulatorOp::Sum, AccumulatorOp::Min, AccumulatorOp::Max] {
            group.insert(measure_field(measure, op), accumulator(op, reference(measure)));
        }
        group.insert(
            measure_field(measure, AccumulatorOp::Count),
            accumulator(AccumulatorOp::Sum, truthy_flag(measure)),
        );
    }

    let mut project = FieldBuilder::new();
    project.insert(ID_FIELD, 0);
    project.insert(COUNT_FIELD, 1);
    for measure in measures {
        let measure = measure.as_ref();
        project.insert(measure, measure_stats(measure));
    }
    for dimension in dimensions {
        let dimension = dimension.as_ref();
        let key_path = format!("{}.{}", ID_FIELD, encode_dimension(dimension));
        project.insert(dimension, reference(&key_path));
    }

    debug!(
        target_collection = target,
        dimensions = dimensions.len(),
        measures = measures.len(),
        "Built cube pipeline"
    );

    Pipeline::new(vec![
        Stage::Group(GroupStage::new(id.into_value(), group.into_document())),
        Stage::Project(project.into_document()),
        Stage::Out {
            target: target.to_string(),
        },
    ])
}

/// `{sum, min, max, count}` record of one measure, read from the group output.
fn measure_stats(measure: &str) -> Value {
    let mut stats = FieldBuilder::new();
    for op in [
        AccumulatorOp::Sum,
        AccumulatorOp::Min,
        AccumulatorOp::Max,
        AccumulatorOp::Count,
    ] {
        stats.insert(op.as_str(), reference(&measure_field(measure, op)));
    }
    stats.into_value()
}
