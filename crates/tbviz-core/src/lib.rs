pub mod config;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod frames;
pub mod normalize;
pub mod pipelines;
pub mod reconcile;
pub mod reference;
pub mod types;
pub mod views;

pub use config::PipelineConfig;
pub use diagnostics::{Diagnostics, Issue, IssueKind};
pub use error::{PipelineError, ReferenceError, Result};
pub use normalize::{normalize, NormalizeOutcome, NormalizedTable};
pub use pipelines::{all_pipeline_descriptors, Pipeline, PipelineInputs, PipelineOutput, PipelineSummary};
pub use reference::ReferenceData;
