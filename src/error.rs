//! Error types for the split/transform/merge pipeline.
//!
//! Errors are layered by blast radius:
//!
//! - [`ChunkError`]: one chunk failed; the chunk's original text stands in.
//! - [`FileError`]: one file could not be read; sibling files continue.
//! - [`AcquisitionError`] / [`ConfigError`]: the run cannot start.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a [`TransformGateway`](crate::output::TransformGateway).
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The service could not be reached or answered with a server error.
    #[error("transformation service unavailable: {0}")]
    Unavailable(String),

    /// The service throttled the request.
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// No answer before the caller-supplied deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The service refused the request (bad request, auth, oversized input).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The service answered but the body carried no usable text.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Classify this failure for the chunk error record.
    pub fn kind(&self) -> ChunkErrorKind {
        match self {
            GatewayError::Unavailable(_) | GatewayError::Timeout(_) => {
                ChunkErrorKind::GatewayUnavailable
            }
            GatewayError::RateLimited(_) => ChunkErrorKind::RateLimitExceeded,
            GatewayError::Rejected(_) | GatewayError::InvalidResponse(_) => {
                ChunkErrorKind::TransformFailed
            }
        }
    }
}

/// Category of a chunk-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkErrorKind {
    TransformFailed,
    GatewayUnavailable,
    RateLimitExceeded,
    /// The reply could not be interpreted (graph mode only).
    InvalidAnalysis,
}

/// A recorded chunk-level failure.
///
/// Never aborts sibling work: the pipeline records it in the owning file's
/// error list and continues with the chunk's original content.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{qualified_name}: {message}")]
pub struct ChunkError {
    pub qualified_name: String,
    pub message: String,
    pub kind: ChunkErrorKind,
}

impl ChunkError {
    pub fn new(qualified_name: impl Into<String>, kind: ChunkErrorKind, message: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            message: message.into(),
            kind,
        }
    }

    pub fn from_gateway(qualified_name: impl Into<String>, err: &GatewayError) -> Self {
        Self::new(qualified_name, err.kind(), err.to_string())
    }
}

/// Failure reading one input file. Fatal for that file only.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file rejected: {path}: {reason}")]
    Rejected { path: PathBuf, reason: String },
}

impl FileError {
    /// Map an I/O error to `NotFound` or `Io`.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            FileError::NotFound(path)
        } else {
            FileError::Io { path, source }
        }
    }
}

/// A merged document that still fails validation after repair.
///
/// Carried alongside the best-effort document; never replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("merged document failed validation: {}", issues.join("; "))]
pub struct MergeWarning {
    pub issues: Vec<String>,
}

/// Failure obtaining the repository. Fatal for the whole run.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("only HTTPS GitHub URLs are supported: {0}")]
    InvalidUrl(String),

    #[error("git clone failed: {0}")]
    CloneFailed(String),

    #[error("git clone timed out after {0:?}")]
    Timeout(Duration),

    #[error("repository path does not exist: {0}")]
    MissingPath(PathBuf),

    #[error("I/O error during acquisition: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid configuration value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown concurrency preset '{name}'. Available presets: {available}")]
    UnknownPreset { name: String, available: String },

    #[error("unknown model preset '{name}'. Available presets: {available}")]
    UnknownModel { name: String, available: String },

    #[error("invalid token budget: {0}")]
    InvalidBudget(usize),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Run-fatal errors surfaced by the pipeline entry points.
#[derive(Debug, Error)]
pub enum SplicerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error("failed to list repository files: {0}")]
    Source(#[from] FileError),

    #[error("failed to write artifacts: {0}")]
    Output(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T, E = SplicerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_kinds() {
        assert_eq!(
            GatewayError::RateLimited("429".into()).kind(),
            ChunkErrorKind::RateLimitExceeded
        );
        assert_eq!(
            GatewayError::Timeout(Duration::from_secs(1)).kind(),
            ChunkErrorKind::GatewayUnavailable
        );
        assert_eq!(
            GatewayError::Rejected("bad".into()).kind(),
            ChunkErrorKind::TransformFailed
        );
    }

    #[test]
    fn test_chunk_error_display() {
        let err = ChunkError::from_gateway("Calc.add", &GatewayError::Unavailable("down".into()));
        assert_eq!(err.to_string(), "Calc.add: transformation service unavailable: down");
    }

    #[test]
    fn test_file_error_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(FileError::from_io("A.java", io), FileError::NotFound(_)));
    }
}
