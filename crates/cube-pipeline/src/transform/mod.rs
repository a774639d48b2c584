//! Composable pipeline transformations.
//!
//! Rewrites are expressed as [`PipelineTransformer`]s and chained through a
//! [`TransformPipeline`], which applies them in priority order.
//!
//! # Example
//!
//! ```rust,ignore
//! use cube_pipeline::transform::{CubeQueryTransformer, TransformPipeline};
//!
//! let pipeline = TransformPipeline::empty().with_transformer(Arc::new(CubeQueryTransformer));
//!
//! let rewritten = pipeline.apply_json(&serde_json::json!([
//!     {"$group": {"_id": "$State", "n": {"$sum": 1}}}
//! ]))?;
//! ```

mod cube_query;
mod pipeline;
mod traits;

pub use cube_query::{CubeQueryTransformer, CUBE_QUERY_PRIORITY};
pub use pipeline::TransformPipeline;
pub use traits::PipelineTransformer;
