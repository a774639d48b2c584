//! Core trait for pipeline transformation

use anyhow::Result;
use cube_api::Pipeline;

/// A step that maps one pipeline to another.
///
/// Transformers are applied in ascending `priority()` order; transformers with
/// equal priority keep their registration order.
///
/// # Example
///
/// ```rust,ignore
/// struct DropLimits;
///
/// impl PipelineTransformer for DropLimits {
///     fn priority(&self) -> i32 {
///         100
///     }
///
///     fn transform(&self, pipeline: Pipeline) -> Result<Pipeline> {
///         Ok(pipeline
///             .into_iter()
///             .filter(|stage| stage.kind() != "$limit")
///             .collect::<Vec<_>>()
///             .into())
///     }
/// }
/// ```
pub trait PipelineTransformer: Send + Sync {
    /// Lower values run first.
    fn priority(&self) -> i32 {
        0
    }

    /// Human-readable name for debugging and logging.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn transform(&self, pipeline: Pipeline) -> Result<Pipeline>;
}
