//! Core data model for the split/transform/merge pipeline.

mod chunk;
pub mod config;
mod result;
mod source;

pub use chunk::{Chunk, ChunkKind, TransformedChunk};
pub use config::{ConcurrencyPreset, ConcurrencyProfile, ModelPreset, PipelineConfig, PipelineMode};
pub use result::{BatchResult, ChunkErrorRecord, FileStatus, RepositoryResult};
pub use source::SourceDocument;
