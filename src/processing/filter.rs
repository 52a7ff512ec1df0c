//! File filtering rules for repository traversal.
//!
//! Decides which files a repository walk hands to the pipeline: only
//! source files with an accepted extension, outside build output, VCS and
//! tooling directories, and within the size limit.

use std::collections::HashSet;
use std::path::Path;

/// Configuration for file filtering.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Directory names pruned from the walk wherever they appear.
    pub excluded_directories: HashSet<String>,
    /// Accepted file extensions, without the dot.
    pub extensions: HashSet<String>,
    /// Maximum file size in bytes (default: 2MB).
    pub max_file_size: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            excluded_directories: default_excluded_directories(),
            extensions: ["java".to_string()].into_iter().collect(),
            max_file_size: 2 * 1024 * 1024,
        }
    }
}

fn default_excluded_directories() -> HashSet<String> {
    [
        // Version control
        ".git",
        ".svn",
        ".hg",
        // Build output
        "target",
        "build",
        "bin",
        "out",
        // Tooling
        "node_modules",
        ".gradle",
        ".mvn",
        ".github",
        ".idea",
        ".vscode",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// File filter for determining which files to process.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    config: FilterConfig,
}

impl FileFilter {
    /// Create a new file filter with the given configuration.
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Create a filter with default configuration.
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Whether a directory with this name is pruned from the walk.
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.config.excluded_directories.contains(name)
    }

    /// Check if a file should be processed.
    ///
    /// `path` is relative to the repository root. Returns `Err(reason)` when
    /// the file should be skipped.
    pub fn should_process(&self, path: &Path, size: u64) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            for component in parent.components() {
                if let Some(name) = component.as_os_str().to_str() {
                    if self.is_excluded_dir(name) {
                        return Err(format!("In excluded directory: {}", name));
                    }
                }
            }
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext {
            Some(ext) if self.config.extensions.contains(&ext) => {}
            Some(ext) => return Err(format!("Unsupported extension: .{}", ext)),
            None => return Err("No file extension".to_string()),
        }

        if size > self.config.max_file_size {
            return Err(format!(
                "File too large: {} bytes (max: {})",
                size, self.config.max_file_size
            ));
        }

        Ok(())
    }

    /// Check if content appears to be binary.
    pub fn is_binary_content(&self, content: &[u8], sample_size: usize) -> bool {
        let sample = &content[..content.len().min(sample_size)];

        // UTF-16 text legitimately carries NUL bytes
        if sample.starts_with(&[0xFF, 0xFE]) || sample.starts_with(&[0xFE, 0xFF]) {
            return false;
        }

        if sample.contains(&0) {
            return true;
        }

        let non_printable = sample
            .iter()
            .filter(|&&b| b < 32 && !matches!(b, 9 | 10 | 12 | 13))
            .count();

        !sample.is_empty() && (non_printable as f64 / sample.len() as f64) > 0.1
    }

    /// Get the configuration.
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excluded_directories() {
        let filter = FileFilter::with_defaults();

        assert!(filter.should_process(Path::new("target/classes/A.java"), 100).is_err());
        assert!(filter.should_process(Path::new(".git/hooks/B.java"), 100).is_err());
        assert!(filter
            .should_process(Path::new("app/build/generated/C.java"), 100)
            .is_err());
        assert!(filter.is_excluded_dir(".gradle"));
    }

    #[test]
    fn test_extensions() {
        let filter = FileFilter::with_defaults();

        assert!(filter.should_process(Path::new("src/Main.java"), 100).is_ok());
        assert!(filter.should_process(Path::new("src/Main.JAVA"), 100).is_ok());
        assert!(filter.should_process(Path::new("src/main.rs"), 100).is_err());
        assert!(filter.should_process(Path::new("Makefile"), 100).is_err());
    }

    #[test]
    fn test_size_limit() {
        let filter = FileFilter::new(FilterConfig {
            max_file_size: 10,
            ..FilterConfig::default()
        });

        assert!(filter.should_process(Path::new("A.java"), 10).is_ok());
        let reason = filter.should_process(Path::new("A.java"), 11).unwrap_err();
        assert!(reason.starts_with("File too large"));
    }

    #[test]
    fn test_binary_detection() {
        let filter = FileFilter::with_defaults();

        assert!(!filter.is_binary_content(b"class A {}\n", 1024));
        assert!(filter.is_binary_content(b"\xCA\xFE\xBA\xBE\x00\x00", 1024));
        assert!(!filter.is_binary_content(b"\xFF\xFEc\x00", 1024));
    }
}
