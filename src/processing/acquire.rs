//! Repository acquisition: a local directory or a shallow clone of a GitHub
//! repository into a temporary directory.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tempfile::TempDir;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

use super::repository::LocalRepository;
use crate::error::AcquisitionError;
use crate::types::PipelineConfig;

const GITHUB_PREFIX: &str = "https://github.com/";

/// A repository ready to be read. A cloned checkout is deleted on drop.
#[derive(Debug)]
pub struct AcquiredRepository {
    path: PathBuf,
    name: String,
    checkout: Option<TempDir>,
}

impl AcquiredRepository {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Short name used in reports (`kitchensink` for `.../user/kitchensink`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_clone(&self) -> bool {
        self.checkout.is_some()
    }

    /// File source over the acquired checkout.
    pub fn source(&self) -> Result<LocalRepository, AcquisitionError> {
        LocalRepository::open(&self.path)
    }
}

/// Resolves a path or GitHub URL into an [`AcquiredRepository`].
#[derive(Debug, Clone)]
pub struct GitAcquirer {
    token: Option<String>,
    clone_timeout: Duration,
}

impl GitAcquirer {
    pub fn new(clone_timeout: Duration) -> Self {
        Self {
            token: None,
            clone_timeout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.clone_timeout()).with_token(config.github_token.clone())
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Whether `target` should be cloned rather than opened.
    pub fn is_remote(target: &str) -> bool {
        let target = target.trim();
        target.starts_with("https://") || target.starts_with("http://") || target.starts_with("git@")
    }

    /// Acquire `target`: clone it when it is a URL, open it otherwise.
    pub async fn acquire(&self, target: &str) -> Result<AcquiredRepository, AcquisitionError> {
        if Self::is_remote(target) {
            return self.clone_repository(target).await;
        }

        let path = PathBuf::from(target);
        if !path.is_dir() {
            return Err(AcquisitionError::MissingPath(path));
        }
        let name = path
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| target.to_string());

        Ok(AcquiredRepository {
            path,
            name,
            checkout: None,
        })
    }

    /// Shallow-clone a GitHub repository into a temporary directory.
    pub async fn clone_repository(&self, url: &str) -> Result<AcquiredRepository, AcquisitionError> {
        let url = normalize_github_url(url)?;
        let name = repository_name(&url);

        let checkout = tempfile::Builder::new().prefix("splicer_repo_").tempdir()?;
        let dest = checkout.path().join(&name);

        info!(url = %url, dest = %dest.display(), "Cloning repository");

        let mut command = Command::new("git");
        command
            .arg("clone")
            .arg("--depth")
            .arg("1")
            .arg(self.authenticated_url(&url))
            .arg(&dest)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match timeout(self.clone_timeout, command.output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!(url = %url, timeout_secs = self.clone_timeout.as_secs(), "Clone timed out");
                return Err(AcquisitionError::Timeout(self.clone_timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AcquisitionError::CloneFailed(self.redact(stderr.trim())));
        }

        info!(url = %url, "Repository cloned");
        Ok(AcquiredRepository {
            path: dest,
            name,
            checkout: Some(checkout),
        })
    }

    fn authenticated_url(&self, url: &str) -> String {
        match (&self.token, url.strip_prefix("https://")) {
            (Some(token), Some(rest)) => format!("https://{token}@{rest}"),
            _ => url.to_string(),
        }
    }

    fn redact(&self, message: &str) -> String {
        match &self.token {
            Some(token) => message.replace(token.as_str(), "***"),
            None => message.to_string(),
        }
    }
}

/// Normalize a GitHub URL for cloning: HTTPS only, `/tree/<branch>` removed,
/// `.git` appended.
pub fn normalize_github_url(url: &str) -> Result<String, AcquisitionError> {
    let url = url.trim();
    if !url.starts_with(GITHUB_PREFIX) {
        return Err(AcquisitionError::InvalidUrl(url.to_string()));
    }

    let url = url.split("/tree/").next().unwrap_or(url).trim_end_matches('/');
    if url.len() <= GITHUB_PREFIX.len() {
        return Err(AcquisitionError::InvalidUrl(url.to_string()));
    }

    if url.ends_with(".git") {
        Ok(url.to_string())
    } else {
        Ok(format!("{url}.git"))
    }
}

/// Repository name from a GitHub URL.
pub fn repository_name(url: &str) -> String {
    let url = url.split("/tree/").next().unwrap_or(url);
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(|name| name.trim_end_matches(".git"))
        .filter(|name| !name.is_empty())
        .unwrap_or("repository")
        .to_string()
}
