//! Shared configuration types for ingestion pipelines.

mod base;
mod batch;
mod pipeline;
mod retry;
mod source;

pub use base::ValidationError;
pub use batch::BatchConfig;
pub use pipeline::PipelineConfig;
pub use retry::RetryConfig;
pub use source::SourceConfig;
