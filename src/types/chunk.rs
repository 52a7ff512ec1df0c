//! Chunk type definitions.

use serde::{Deserialize, Serialize};

use crate::error::ChunkError;

/// How a chunk was carved out of its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// The whole document fits in one request.
    FullFile,
    /// One complete top-level class (plus header).
    ClassBody,
    /// One method wrapped in its class header, within budget.
    Method,
    /// One method wrapped in its class header, over budget.
    LargeMethod,
    /// Line-oriented fallback when structural parsing failed.
    TextFallback,
}

impl ChunkKind {
    /// Method-level kinds share a deduplication namespace.
    pub fn is_method(&self) -> bool {
        matches!(self, ChunkKind::Method | ChunkKind::LargeMethod)
    }

    /// Kinds that carry a complete class (or the whole file).
    pub fn is_class_level(&self) -> bool {
        matches!(self, ChunkKind::FullFile | ChunkKind::ClassBody)
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkKind::FullFile => write!(f, "full_file"),
            ChunkKind::ClassBody => write!(f, "class_body"),
            ChunkKind::Method => write!(f, "method"),
            ChunkKind::LargeMethod => write!(f, "large_method"),
            ChunkKind::TextFallback => write!(f, "text_fallback"),
        }
    }
}

/// A unit of work sent to the transformation service.
///
/// `content` already carries whatever header context the remote call needs
/// (package, imports, enclosing class header). Line numbers refer to the
/// original file, 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in extraction order; merge keys on this, not completion order
    pub index: usize,

    /// Text sent to the remote service
    pub content: String,

    /// First line of the original file covered by this chunk
    pub start_line: usize,

    /// Last line of the original file covered by this chunk
    pub end_line: usize,

    /// How the chunk was produced
    pub kind: ChunkKind,

    /// `ClassName`, `ClassName.methodName` or `chunk_<n>`
    pub qualified_name: String,

    /// Budget units consumed by `content`
    pub token_count: usize,

    /// Package declaration of the owning document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    /// Import lines of the owning document
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
}

impl Chunk {
    /// Class part of the qualified name (text before the first `.`).
    pub fn class_name(&self) -> &str {
        self.qualified_name
            .split('.')
            .next()
            .unwrap_or(&self.qualified_name)
    }

    /// Number of original lines this chunk spans.
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// A chunk paired with the outcome of its remote transformation.
#[derive(Debug, Clone)]
pub struct TransformedChunk {
    pub chunk: Chunk,
    pub outcome: Result<String, ChunkError>,
}

impl TransformedChunk {
    pub fn success(chunk: Chunk, text: String) -> Self {
        Self {
            chunk,
            outcome: Ok(text),
        }
    }

    pub fn failure(chunk: Chunk, error: ChunkError) -> Self {
        Self {
            chunk,
            outcome: Err(error),
        }
    }

    /// Text to merge: the transformed text, or the original content on failure.
    pub fn text(&self) -> &str {
        match &self.outcome {
            Ok(text) => text,
            Err(_) => &self.chunk.content,
        }
    }

    /// Whether the original content was substituted.
    pub fn is_fallback(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn error(&self) -> Option<&ChunkError> {
        self.outcome.as_ref().err()
    }
}
