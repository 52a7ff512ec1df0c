//! Per-file and per-run outcome records.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chunk::TransformedChunk;
use super::config::{ConcurrencyProfile, PipelineMode};
use crate::error::{ChunkError, ChunkErrorKind};
use crate::graph::CodeGraph;

/// Overall outcome of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Every chunk was transformed
    Success,
    /// Some chunks fell back to their original text
    PartialSuccess,
    /// Nothing was transformed, or the file could not be read
    Failed,
}

/// Outcome of one file in a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    /// Path relative to the repository root
    pub path: PathBuf,

    /// Merged document; not part of the persisted report
    #[serde(skip)]
    pub document: Option<String>,

    /// Where the merged document was written
    pub output_path: Option<PathBuf>,

    /// Chunk-level failures in chunk order
    pub errors: Vec<ChunkError>,

    /// Failure that prevented the file from being processed at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_error: Option<String>,

    /// Merge validation warnings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    pub status: FileStatus,
    pub chunk_count: usize,
    pub elapsed_ms: u64,

    /// Graph mode only
    #[serde(skip)]
    pub graph: Option<CodeGraph>,
}

impl BatchResult {
    /// Empty record for a file about to be processed.
    pub fn pending(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            document: None,
            output_path: None,
            errors: Vec::new(),
            file_error: None,
            warnings: Vec::new(),
            status: FileStatus::Success,
            chunk_count: 0,
            elapsed_ms: 0,
            graph: None,
        }
    }

    /// Record for a file that could not be read.
    pub fn failed(path: impl Into<PathBuf>, error: impl ToString) -> Self {
        let mut result = Self::pending(path);
        result.file_error = Some(error.to_string());
        result.status = FileStatus::Failed;
        result
    }

    /// Record one resolved chunk.
    pub fn record(&mut self, chunk: &TransformedChunk) {
        self.chunk_count += 1;
        if let Some(err) = chunk.error() {
            self.errors.push(err.clone());
        }
    }

    /// Record a chunk-level failure that has no transformed counterpart.
    pub fn record_error(&mut self, error: ChunkError) {
        self.chunk_count += 1;
        self.errors.push(error);
    }

    /// Record a chunk that succeeded without a [`TransformedChunk`].
    pub fn record_success(&mut self) {
        self.chunk_count += 1;
    }

    /// Close the record once every chunk has resolved.
    pub fn seal(&mut self, document: Option<String>, warnings: Vec<String>) {
        self.document = document;
        self.warnings = warnings;
        self.status = if self.file_error.is_some() {
            FileStatus::Failed
        } else if self.errors.is_empty() {
            FileStatus::Success
        } else if self.errors.len() < self.chunk_count {
            FileStatus::PartialSuccess
        } else {
            FileStatus::Failed
        };
    }

    pub fn is_success(&self) -> bool {
        self.status == FileStatus::Success
    }
}

/// A chunk error tagged with the file it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkErrorRecord {
    pub file: PathBuf,
    pub qualified_name: String,
    pub message: String,
    pub kind: ChunkErrorKind,
}

/// Aggregate outcome of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryResult {
    pub run_id: Uuid,
    pub repository: String,
    pub mode: PipelineMode,
    pub profile: ConcurrencyProfile,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,

    pub total_files: usize,
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
    pub total_chunks: usize,
    pub failed_chunks: usize,

    /// Highest number of file tasks holding a file permit at once
    #[serde(default)]
    pub peak_concurrent_files: usize,
    /// Highest number of remote calls in flight at once
    #[serde(default)]
    pub peak_concurrent_calls: usize,

    pub files: Vec<BatchResult>,
    pub errors: Vec<ChunkErrorRecord>,

    /// Repository-wide graph (graph mode only)
    #[serde(skip)]
    pub graph: Option<CodeGraph>,
}

impl RepositoryResult {
    /// Aggregate sealed file results. Files are ordered by path.
    pub fn from_files(
        run_id: Uuid,
        repository: impl Into<String>,
        mode: PipelineMode,
        profile: ConcurrencyProfile,
        started_at: DateTime<Utc>,
        mut files: Vec<BatchResult>,
    ) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let count = |status: FileStatus| files.iter().filter(|f| f.status == status).count();
        let errors: Vec<ChunkErrorRecord> = files
            .iter()
            .flat_map(|f| {
                f.errors.iter().map(|e| ChunkErrorRecord {
                    file: f.path.clone(),
                    qualified_name: e.qualified_name.clone(),
                    message: e.message.clone(),
                    kind: e.kind,
                })
            })
            .collect();

        let finished_at = Utc::now();
        Self {
            run_id,
            repository: repository.into(),
            mode,
            profile,
            started_at,
            finished_at,
            elapsed_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
            total_files: files.len(),
            succeeded: count(FileStatus::Success),
            partial: count(FileStatus::PartialSuccess),
            failed: count(FileStatus::Failed),
            total_chunks: files.iter().map(|f| f.chunk_count).sum(),
            failed_chunks: errors.len(),
            peak_concurrent_files: 0,
            peak_concurrent_calls: 0,
            files,
            errors,
            graph: None,
        }
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<&BatchResult> {
        self.files.iter().find(|f| f.path == path.as_ref())
    }

    /// One-line summary for logs and the binary.
    pub fn summary(&self) -> String {
        format!(
            "{} files: {} succeeded, {} partial, {} failed ({} of {} chunks failed) in {} ms",
            self.total_files,
            self.succeeded,
            self.partial,
            self.failed,
            self.failed_chunks,
            self.total_chunks,
            self.elapsed_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::config::ConcurrencyPreset;
    use crate::types::{Chunk, ChunkKind};

    fn transformed(name: &str, ok: bool) -> TransformedChunk {
        let chunk = Chunk {
            index: 0,
            content: "x".into(),
            start_line: 1,
            end_line: 1,
            kind: ChunkKind::Method,
            qualified_name: name.into(),
            token_count: 1,
            package: None,
            imports: Vec::new(),
        };
        if ok {
            TransformedChunk::success(chunk, "y".into())
        } else {
            let err = ChunkError::new(name, ChunkErrorKind::TransformFailed, "boom");
            TransformedChunk::failure(chunk, err)
        }
    }

    #[test]
    fn test_status_rules() {
        let mut all_ok = BatchResult::pending("A.java");
        all_ok.record(&transformed("A.f", true));
        all_ok.seal(Some("doc".into()), Vec::new());
        assert_eq!(all_ok.status, FileStatus::Success);

        let mut partial = BatchResult::pending("B.java");
        partial.record(&transformed("B.f", true));
        partial.record(&transformed("B.g", false));
        partial.seal(Some("doc".into()), Vec::new());
        assert_eq!(partial.status, FileStatus::PartialSuccess);
        assert_eq!(partial.errors.len(), 1);

        let mut none = BatchResult::pending("C.java");
        none.record(&transformed("C.f", false));
        none.seal(Some("doc".into()), Vec::new());
        assert_eq!(none.status, FileStatus::Failed);

        let unreadable = BatchResult::failed("D.java", "file not found: D.java");
        assert_eq!(unreadable.status, FileStatus::Failed);
    }

    #[test]
    fn test_aggregate_counts() {
        let mut ok = BatchResult::pending("b/Ok.java");
        ok.record(&transformed("Ok.f", true));
        ok.seal(Some("doc".into()), Vec::new());

        let mut partial = BatchResult::pending("a/Partial.java");
        partial.record(&transformed("Partial.f", false));
        partial.record(&transformed("Partial.g", true));
        partial.seal(Some("doc".into()), Vec::new());

        let profile = ConcurrencyPreset::Balanced.base_profile();
        let result = RepositoryResult::from_files(
            Uuid::new_v4(),
            "repo",
            PipelineMode::Document,
            profile,
            Utc::now(),
            vec![ok, partial],
        );

        assert_eq!(result.total_files, 2);
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.partial, 1);
        assert_eq!(result.total_chunks, 3);
        assert_eq!(result.failed_chunks, 1);
        assert_eq!(result.files[0].path, PathBuf::from("a/Partial.java"));
        assert_eq!(result.errors[0].qualified_name, "Partial.f");
        assert!(result.summary().starts_with("2 files: 1 succeeded, 1 partial, 0 failed"));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["files"][0]["status"], "partial_success");
        assert!(json["files"][0].get("document").is_none());
    }
}
