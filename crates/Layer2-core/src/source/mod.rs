//! Source Acquisition
//!
//! Turns a source descriptor (zip archive URL or git repository URL) into a
//! materialized instance directory, and resolves id collisions against the
//! owner's existing instances.

use async_trait::async_trait;
use cloudhost_foundation::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error as ThisError;
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

// ============================================================================
// Descriptor
// ============================================================================

/// Source reference for a hosted instance. Exactly one variant is supplied;
/// the front end validates "zip xor repo" before this layer is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    /// Uploaded zip archive, fetched by URL
    Archive { url: String, file_name: String },
    /// Remote git repository
    Repository { url: String },
}

impl SourceDescriptor {
    /// Base instance name derived from the descriptor:
    /// archive file stem (`.zip` stripped), or the last path segment of the
    /// repository URL with a trailing `.git` stripped.
    pub fn base_name(&self) -> String {
        let name = match self {
            SourceDescriptor::Archive { file_name, .. } => {
                let bytes = file_name.as_bytes();
                if bytes.len() >= 4 && bytes[bytes.len() - 4..].eq_ignore_ascii_case(b".zip") {
                    file_name[..file_name.len() - 4].to_string()
                } else {
                    file_name.clone()
                }
            }
            SourceDescriptor::Repository { url } => {
                let trimmed = url.trim_end_matches('/');
                let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
                last.strip_suffix(".git").unwrap_or(last).to_string()
            }
        };

        if name.is_empty() {
            "app".to_string()
        } else {
            name
        }
    }
}

/// Resolve an id unique within `existing`: `base`, then `base_1`, `base_2`, …
/// Lowest free integer wins, so sequential collisions produce a stable order.
pub fn resolve_id(existing: &[String], base: &str) -> String {
    if !existing.iter().any(|id| id == base) {
        return base.to_string();
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{}_{}", base, counter);
        if !existing.iter().any(|id| id == &candidate) {
            return candidate;
        }
        counter += 1;
    }
}

// ============================================================================
// Fetch Errors
// ============================================================================

#[derive(Debug, ThisError)]
pub enum FetchError {
    #[error("Failed to clone repository: {0}")]
    CloneFailed(String),

    #[error("Failed to download archive: {0}")]
    DownloadFailed(String),

    #[error("Failed to extract archive: {0}")]
    ExtractFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FetchError> for Error {
    fn from(e: FetchError) -> Self {
        Error::Acquisition(e.to_string())
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// External collaborator: materialize a descriptor into `dest`.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, descriptor: &SourceDescriptor, dest: &Path) -> Result<()>;
}

/// Production fetcher: `git clone` for repositories, HTTP download + `unzip`
/// for archives.
pub struct ShellFetcher {
    client: reqwest::Client,
}

impl ShellFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn clone_repository(&self, url: &str, dest: &Path) -> std::result::Result<(), FetchError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        debug!("Cloning {} into {}", url, dest.display());
        let output = Command::new("git")
            .arg("clone")
            .arg(url)
            .arg(dest)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::CloneFailed(stderr.trim().to_string()));
        }

        info!("Cloned {} into {}", url, dest.display());
        Ok(())
    }

    async fn fetch_archive(&self, url: &str, dest: &Path) -> std::result::Result<(), FetchError> {
        tokio::fs::create_dir_all(dest).await?;

        debug!("Downloading archive {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::DownloadFailed(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::DownloadFailed(e.to_string()))?;

        // Staging file next to the destination, uuid-named to avoid clashes
        let staging = dest.with_extension(format!("{}.zip", Uuid::new_v4()));
        tokio::fs::write(&staging, &bytes).await?;

        let output = Command::new("unzip")
            .arg("-o")
            .arg(&staging)
            .arg("-d")
            .arg(dest)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        // Best-effort staging cleanup before error handling
        let _ = tokio::fs::remove_file(&staging).await;

        let output = output?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::ExtractFailed(stderr.trim().to_string()));
        }

        info!("Extracted archive into {}", dest.display());
        Ok(())
    }
}

impl Default for ShellFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceFetcher for ShellFetcher {
    async fn fetch(&self, descriptor: &SourceDescriptor, dest: &Path) -> Result<()> {
        match descriptor {
            SourceDescriptor::Repository { url } => {
                self.clone_repository(url, dest).await?;
            }
            SourceDescriptor::Archive { url, .. } => {
                self.fetch_archive(url, dest).await?;
            }
        }
        Ok(())
    }
}

/// Instance directory for an id.
pub fn instance_dir(instances_dir: &Path, id: &str) -> PathBuf {
    instances_dir.join(id)
}
