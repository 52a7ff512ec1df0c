//! Source document definitions.

use std::path::{Path, PathBuf};

use crate::chunkers::scanner::locate_header;

/// An input file, immutable once built.
///
/// The package declaration and import lines are derived at construction
/// time and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    path: Option<PathBuf>,
    text: String,
    package: Option<String>,
    imports: Vec<String>,
}

impl SourceDocument {
    /// Build a document from raw text.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let (package, imports) = locate_header(&text);
        Self {
            path: None,
            text,
            package,
            imports,
        }
    }

    /// Build a document that remembers where it was read from.
    pub fn from_file(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let mut doc = Self::new(text);
        doc.path = Some(path.into());
        doc
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The `package ...;` line, if any.
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Distinct `import ...;` lines in first-seen order.
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// Lines of the document without terminators.
    pub fn lines(&self) -> Vec<&str> {
        self.text.lines().collect()
    }

    /// Number of lines, never less than one.
    pub fn line_count(&self) -> usize {
        self.text.lines().count().max(1)
    }

    /// Name used in logs: the file name when known.
    pub fn display_name(&self) -> String {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<memory>".to_string())
    }
}
