//! Splicer Library
//!
//! Splits brace-delimited, class-based sources (Java-shaped) into
//! token-bounded chunks, sends every chunk to a remote transformation
//! service under bounded concurrency, and reassembles the replies into one
//! coherent document per file. A graph surface runs the same cycle and
//! aggregates relationship analyses instead.

pub mod ast_engine;
pub mod batch;
pub mod chunkers;
pub mod error;
pub mod graph;
pub mod merge;
pub mod output;
pub mod processing;
pub mod types;

pub use batch::{BatchProcessor, RateLimiter, RunState};
pub use chunkers::{dedupe, ApproximateCounter, ChunkExtractor, TiktokenCounter, TokenCounter};
pub use error::{ChunkError, FileError, GatewayError, MergeWarning, SplicerError};
pub use merge::{MergeOutcome, Reassembler};
pub use output::{HttpTransformGateway, ReportWriter, TransformGateway};
pub use processing::{FileSource, GitAcquirer, LocalRepository};
pub use types::{
    BatchResult, Chunk, ChunkKind, ConcurrencyPreset, ConcurrencyProfile, FileStatus,
    PipelineConfig, PipelineMode, RepositoryResult, SourceDocument, TransformedChunk,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::batch::{BatchProcessor, RunState};
    pub use crate::chunkers::{dedupe, ChunkExtractor, TokenCounter};
    pub use crate::error::{ChunkError, ChunkErrorKind, FileError, GatewayError, MergeWarning, SplicerError};
    pub use crate::merge::Reassembler;
    pub use crate::output::{ReportWriter, TransformGateway};
    pub use crate::processing::{FileSource, LocalRepository};
    pub use crate::types::*;
}

/// Default model preset name
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default deadline for one remote call, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default deadline for cloning a repository, in seconds
pub const DEFAULT_CLONE_TIMEOUT_SECS: u64 = 300;
