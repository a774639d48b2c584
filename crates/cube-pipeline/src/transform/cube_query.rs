//! CubeQueryTransformer - points a raw-collection query at a cube

use anyhow::Result;
use cube_api::Pipeline;
use tracing::debug;

use super::traits::PipelineTransformer;
use crate::{check_compatibility, rewrite_pipeline};

/// Priority for the CubeQueryTransformer.
/// Runs early so later transformers see the cube-side pipeline.
pub const CUBE_QUERY_PRIORITY: i32 = -10;

/// Validates the query and rewrites its leading `$group` to read from a cube.
///
/// Fails with a [`cube_api::PipelineError`] for queries the cube cannot answer.
pub struct CubeQueryTransformer;

impl PipelineTransformer for CubeQueryTransformer {
    fn priority(&self) -> i32 {
        CUBE_QUERY_PRIORITY
    }

    fn name(&self) -> &'static str {
        "CubeQueryTransformer"
    }

    fn transform(&self, pipeline: Pipeline) -> Result<Pipeline> {
        let tuples = check_compatibility(&pipeline)?;
        let rewritten = rewrite_pipeline(&pipeline, &tuples);

        debug!(
            "CubeQueryTransformer: rewrote {} accumulators into {} stages",
            tuples.len(),
            rewritten.len()
        );

        Ok(rewritten)
    }
}
