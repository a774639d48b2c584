//! Transform Pipeline for orchestrating pipeline rewrites

use std::sync::Arc;

use anyhow::{Context, Result};
use cube_api::Pipeline;
use serde_json::Value;
use tracing::{debug, instrument};

use super::traits::PipelineTransformer;

/// Applies a chain of transformers in priority order.
pub struct TransformPipeline {
    transformers: Vec<Arc<dyn PipelineTransformer>>,
}

impl TransformPipeline {
    /// Create a new pipeline with the given transformers, sorted by priority.
    pub fn new(mut transformers: Vec<Arc<dyn PipelineTransformer>>) -> Self {
        transformers.sort_by_key(|t| t.priority());
        Self { transformers }
    }

    /// Create an empty pipeline with no transformers.
    pub fn empty() -> Self {
        Self {
            transformers: Vec::new(),
        }
    }

    /// Add a transformer, keeping priority order.
    pub fn with_transformer(mut self, transformer: Arc<dyn PipelineTransformer>) -> Self {
        self.transformers.push(transformer);
        self.transformers.sort_by_key(|t| t.priority());
        self
    }

    /// Run every transformer over `pipeline`.
    #[instrument(skip(self, pipeline), fields(stages = pipeline.len()))]
    pub fn apply(&self, mut pipeline: Pipeline) -> Result<Pipeline> {
        for transformer in &self.transformers {
            debug!(
                transformer = transformer.name(),
                priority = transformer.priority(),
                "Applying pipeline transformer"
            );
            pipeline = transformer
                .transform(pipeline)
                .with_context(|| format!("{} failed", transformer.name()))?;
        }
        Ok(pipeline)
    }

    /// Parse a JSON pipeline, run every transformer and serialize the result.
    #[instrument(skip(self, pipeline))]
    pub fn apply_json(&self, pipeline: &Value) -> Result<Value> {
        let parsed = Pipeline::from_json(pipeline).context("Failed to parse pipeline")?;
        Ok(self.apply(parsed)?.to_json())
    }

    /// Get the number of registered transformers.
    pub fn transformer_count(&self) -> usize {
        self.transformers.len()
    }
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::empty()
    }
}
