//! Repository access: listing source files and reading them as text.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

use super::filter::FileFilter;
use crate::error::{AcquisitionError, FileError};

/// Bytes inspected when deciding whether a file is binary.
const BINARY_SAMPLE_BYTES: usize = 8192;

/// Supplies the files of one repository.
///
/// Paths returned by [`list_files`](FileSource::list_files) are relative to
/// [`root`](FileSource::root) and are what [`read_file`](FileSource::read_file)
/// expects.
#[async_trait]
pub trait FileSource: Send + Sync {
    fn root(&self) -> &Path;

    async fn list_files(&self) -> Result<Vec<PathBuf>, FileError>;

    /// Read one file as text with `\n` line endings.
    async fn read_file(&self, path: &Path) -> Result<String, FileError>;
}

/// A repository checked out on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    root: PathBuf,
    filter: FileFilter,
}

impl LocalRepository {
    /// Open an existing directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, AcquisitionError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(AcquisitionError::MissingPath(root));
        }
        Ok(Self {
            root,
            filter: FileFilter::with_defaults(),
        })
    }

    pub fn with_filter(mut self, filter: FileFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }
}

#[async_trait]
impl FileSource for LocalRepository {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn list_files(&self) -> Result<Vec<PathBuf>, FileError> {
        let root = self.root.clone();
        let filter = self.filter.clone();

        let files = tokio::task::spawn_blocking(move || scan(&root, &filter))
            .await
            .map_err(|e| FileError::Io {
                path: self.root.clone(),
                source: io::Error::new(io::ErrorKind::Other, e.to_string()),
            })??;

        info!(root = %self.root.display(), files = files.len(), "Found source files");
        Ok(files)
    }

    async fn read_file(&self, path: &Path) -> Result<String, FileError> {
        let bytes = tokio::fs::read(self.root.join(path))
            .await
            .map_err(|e| FileError::from_io(path, e))?;

        if self.filter.is_binary_content(&bytes, BINARY_SAMPLE_BYTES) {
            return Err(FileError::Rejected {
                path: path.to_path_buf(),
                reason: "binary content".to_string(),
            });
        }

        Ok(normalize_line_endings(&decode_source(&bytes)))
    }
}

/// Walk `root` and collect accepted files, relative to `root`, sorted.
fn scan(root: &Path, filter: &FileFilter) -> Result<Vec<PathBuf>, FileError> {
    if !root.is_dir() {
        return Err(FileError::NotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !entry.file_type().is_dir()
            || !entry
                .file_name()
                .to_str()
                .is_some_and(|name| filter.is_excluded_dir(name))
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Failed to read directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);

        match filter.should_process(relative, size) {
            Ok(()) => files.push(relative.to_path_buf()),
            Err(reason) => trace!(path = %relative.display(), %reason, "Skipping file"),
        }
    }

    files.sort();
    debug!(root = %root.display(), files = files.len(), "Repository scan complete");
    Ok(files)
}

/// Decode source bytes: UTF-8, UTF-16 with a byte order mark, else Latin-1.
pub fn decode_source(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.strip_prefix('\u{feff}').unwrap_or(text).to_string();
    }

    let utf16 = match bytes {
        [0xFF, 0xFE, rest @ ..] => Some(
            rest.chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect::<Vec<_>>(),
        ),
        [0xFE, 0xFF, rest @ ..] => Some(
            rest.chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect::<Vec<_>>(),
        ),
        _ => None,
    };
    if let Some(Ok(text)) = utf16.map(|units| String::from_utf16(&units)) {
        return text;
    }

    bytes.iter().map(|&b| b as char).collect()
}

/// Normalize line endings to `\n`.
pub fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, bytes: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    #[tokio::test]
    async fn test_lists_java_files_outside_excluded_dirs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/main/java/App.java", b"class App {}");
        write(dir.path(), "src/main/java/util/Strings.java", b"class Strings {}");
        write(dir.path(), "target/classes/Gen.java", b"class Gen {}");
        write(dir.path(), ".git/Hook.java", b"class Hook {}");
        write(dir.path(), "README.md", b"# readme");

        let repo = LocalRepository::open(dir.path()).unwrap();
        let files = repo.list_files().await.unwrap();

        assert_eq!(
            files,
            vec![
                PathBuf::from("src/main/java/App.java"),
                PathBuf::from("src/main/java/util/Strings.java"),
            ]
        );
    }

    #[tokio::test]
    async fn test_read_normalizes_line_endings() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "A.java", b"class A {\r\n    int x;\r\n}\r\n");

        let repo = LocalRepository::open(dir.path()).unwrap();
        let text = repo.read_file(Path::new("A.java")).await.unwrap();
        assert_eq!(text, "class A {\n    int x;\n}\n");
    }

    #[tokio::test]
    async fn test_read_errors() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Blob.java", b"\x00\x01\x02\x03\x04");

        let repo = LocalRepository::open(dir.path()).unwrap();
        assert!(matches!(
            repo.read_file(Path::new("Missing.java")).await,
            Err(FileError::NotFound(_))
        ));
        assert!(matches!(
            repo.read_file(Path::new("Blob.java")).await,
            Err(FileError::Rejected { .. })
        ));
    }

    #[test]
    fn test_open_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            LocalRepository::open(&missing),
            Err(AcquisitionError::MissingPath(_))
        ));
    }

    #[test]
    fn test_decode_source() {
        assert_eq!(decode_source(b"\xEF\xBB\xBFclass A {}"), "class A {}");
        assert_eq!(decode_source(b"// caf\xE9"), "// café");
        assert_eq!(decode_source(b"\xFF\xFEa\x00{\x00"), "a{");
        assert_eq!(decode_source(b"\xFE\xFF\x00a\x00}"), "a}");
    }
}
