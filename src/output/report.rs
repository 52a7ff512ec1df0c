//! Persisted run artifacts.
//!
//! Layout under the output directory:
//!
//! ```text
//! documentation/<relative path>      merged document per file
//! processing_report.json             serialized RepositoryResult
//! analysis/repository_graph.json     repository graph (graph mode)
//! ```

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::error::Result;
use crate::types::{PipelineConfig, RepositoryResult};

pub const DOCUMENTATION_DIR: &str = "documentation";
pub const REPORT_FILE: &str = "processing_report.json";
pub const ANALYSIS_DIR: &str = "analysis";
pub const GRAPH_FILE: &str = "repository_graph.json";

/// Paths written by [`ReportWriter::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifacts {
    pub report: PathBuf,
    pub graph: Option<PathBuf>,
    pub documents: usize,
}

/// Writes merged documents, the run report and the graph to disk.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Writer rooted at `<output_dir>/<repository>`.
    pub fn for_repository(config: &PipelineConfig, repository: &str) -> Self {
        Self::new(config.output_dir.join(repository))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Destination of the merged document for a repository-relative path.
    /// Components that would leave the documentation directory are dropped.
    pub fn documentation_path(&self, relative: &Path) -> PathBuf {
        let mut dest = self.output_dir.join(DOCUMENTATION_DIR);
        for component in relative.components() {
            if let Component::Normal(part) = component {
                dest.push(part);
            }
        }
        dest
    }

    /// Write every artifact and record document paths in `report`.
    pub async fn write(&self, report: &mut RepositoryResult) -> Result<WrittenArtifacts> {
        fs::create_dir_all(&self.output_dir).await?;

        let mut documents = 0;
        for file in report.files.iter_mut() {
            let Some(document) = &file.document else {
                continue;
            };
            let dest = self.documentation_path(&file.path);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&dest, document).await?;
            debug!(path = %dest.display(), "Wrote merged document");
            file.output_path = Some(dest);
            documents += 1;
        }

        let graph = match &report.graph {
            Some(graph) => {
                let dir = self.output_dir.join(ANALYSIS_DIR);
                fs::create_dir_all(&dir).await?;
                let dest = dir.join(GRAPH_FILE);
                fs::write(&dest, serde_json::to_vec_pretty(graph)?).await?;
                Some(dest)
            }
            None => None,
        };

        let report_path = self.output_dir.join(REPORT_FILE);
        fs::write(&report_path, serde_json::to_vec_pretty(report)?).await?;

        info!(
            output = %self.output_dir.display(),
            documents,
            graph = graph.is_some(),
            "Artifacts written"
        );

        Ok(WrittenArtifacts {
            report: report_path,
            graph,
            documents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CodeGraph, NodeKind};
    use crate::types::{BatchResult, ConcurrencyPreset, PipelineMode};
    use chrono::Utc;
    use uuid::Uuid;

    fn report(mode: PipelineMode) -> RepositoryResult {
        let mut ok = BatchResult::pending("src/demo/Calc.java");
        ok.record_success();
        ok.seal(Some("class Calc {}\n".into()), Vec::new());

        let gone = BatchResult::failed("src/demo/Gone.java", "file not found: src/demo/Gone.java");

        RepositoryResult::from_files(
            Uuid::new_v4(),
            "demo",
            mode,
            ConcurrencyPreset::Balanced.base_profile(),
            Utc::now(),
            vec![ok, gone],
        )
    }

    #[tokio::test]
    async fn test_writes_documents_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("demo"));
        let mut report = report(PipelineMode::Document);

        let written = writer.write(&mut report).await.unwrap();
        assert_eq!(written.documents, 1);
        assert!(written.graph.is_none());

        let doc_path = dir.path().join("demo/documentation/src/demo/Calc.java");
        assert_eq!(std::fs::read_to_string(&doc_path).unwrap(), "class Calc {}\n");

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&written.report).unwrap()).unwrap();
        assert_eq!(json["total_files"], 2);
        assert_eq!(json["files"][0]["output_path"], doc_path.to_str().unwrap());
        assert!(json["files"][1]["output_path"].is_null());
        assert_eq!(json["files"][1]["status"], "failed");
    }

    #[tokio::test]
    async fn test_writes_graph_in_graph_mode() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        let mut report = report(PipelineMode::Graph);
        let mut graph = CodeGraph::new();
        graph.add_node("Calc", NodeKind::Class, None);
        report.graph = Some(graph);

        let written = writer.write(&mut report).await.unwrap();
        let graph_path = written.graph.unwrap();
        assert_eq!(graph_path, dir.path().join("analysis/repository_graph.json"));

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(graph_path).unwrap()).unwrap();
        assert_eq!(json["nodes"][0]["name"], "Calc");
    }

    #[test]
    fn test_documentation_path_stays_inside() {
        let writer = ReportWriter::new("/out");
        assert_eq!(
            writer.documentation_path(Path::new("../../etc/A.java")),
            PathBuf::from("/out/documentation/etc/A.java")
        );
    }
}
