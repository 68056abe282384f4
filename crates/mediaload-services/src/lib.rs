//! Mediaload Services Layer
//!
//! Hosts the upload orchestration ([`ChunkAssembler`]) and re-exports the
//! storage and processing types the API crate needs, so the binary depends on
//! a single service facade. HTTP concerns stay in mediaload-api.

pub mod assembler;

pub use assembler::{ChunkAssembler, IngestOutcome};
pub use mediaload_processing::{
    CommandInvoker, MediaPipeline, MediaTransform, PipelineConfig, ToolInvoker,
};
pub use mediaload_storage::{LocalStore, StorageError, StorageResult};
