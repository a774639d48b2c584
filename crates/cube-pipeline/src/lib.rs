pub mod checker;
pub mod cube;
pub mod definition;
pub mod expr;
pub mod fields;
pub mod rewriter;
pub mod transform;

pub use checker::check_compatibility;
pub use cube::{build_cube_pipeline, encode_dimension};
pub use definition::CubeDefinition;
pub use fields::FieldBuilder;
pub use rewriter::rewrite_pipeline;
// Re-export the shared data model so callers only need this crate
pub use cube_api::{
    AccumulatorOp, AccumulatorTuple, DefinitionError, Document, GroupStage, Pipeline,
    PipelineError, Stage,
};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::instrument;

/// Main entry point: validate a query pipeline and rewrite it to run on a cube.
///
/// The input is never modified; the result shares no structure with it.
pub fn rewrite_for_cube(pipeline: &Pipeline) -> std::result::Result<Pipeline, PipelineError> {
    let tuples = check_compatibility(pipeline)?;
    Ok(rewrite_pipeline(pipeline, &tuples))
}

/// Same as [`rewrite_for_cube`], on the JSON wire form.
#[instrument(skip(pipeline))]
pub fn rewrite_json(pipeline: &Value) -> Result<Value> {
    let parsed = Pipeline::from_json(pipeline).context("Failed to parse query pipeline")?;
    let rewritten = rewrite_for_cube(&parsed).context("Query cannot be answered from a cube")?;
    Ok(rewritten.to_json())
}
