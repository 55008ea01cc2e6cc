//! Dependency Installer
//!
//! Probes the instance directory for a `package.json` manifest and runs the
//! dependency install step. "No manifest" and "entry point missing" are
//! policy outcomes (`started_candidate = false`), not errors; a failing
//! install command is a real `Error::Install`.

use async_trait::async_trait;
use cloudhost_foundation::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// 매니페스트 파일명
pub const MANIFEST_FILE: &str = "package.json";

/// Outcome of probing an instance directory for a startable entry point.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    /// Whether the instance can be started
    pub started_candidate: bool,

    /// Entry file relative to the instance directory (when startable)
    pub main_entry: Option<String>,

    /// Human-readable reason when not startable
    pub reason: String,
}

impl InstallOutcome {
    fn not_startable(reason: impl Into<String>) -> Self {
        Self {
            started_candidate: false,
            main_entry: None,
            reason: reason.into(),
        }
    }

    fn startable(main_entry: impl Into<String>) -> Self {
        Self {
            started_candidate: true,
            main_entry: Some(main_entry.into()),
            reason: String::new(),
        }
    }
}

/// The subset of the manifest we read.
#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    main: Option<String>,
}

/// Check the manifest and entry point of an instance directory.
///
/// `default_entry` is used when the manifest does not declare `main`.
pub fn probe(dir: &Path, default_entry: &str) -> InstallOutcome {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return InstallOutcome::not_startable(format!("No {} found", MANIFEST_FILE));
    }

    let manifest: Manifest = match std::fs::read_to_string(&manifest_path)
        .map_err(Error::from)
        .and_then(|content| serde_json::from_str(&content).map_err(Error::from))
    {
        Ok(m) => m,
        Err(e) => {
            return InstallOutcome::not_startable(format!("Could not read {}: {}", MANIFEST_FILE, e))
        }
    };

    let main = manifest.main.unwrap_or_else(|| default_entry.to_string());
    if !dir.join(&main).exists() {
        return InstallOutcome::not_startable(format!("Main file '{}' not found", main));
    }

    debug!("Entry point for {}: {}", dir.display(), main);
    InstallOutcome::startable(main)
}

// ============================================================================
// Installer
// ============================================================================

/// External collaborator: install declared dependencies in a directory.
#[async_trait]
pub trait DependencyInstaller: Send + Sync {
    async fn install(&self, dir: &Path) -> Result<()>;
}

/// Production installer - runs the configured install command through the
/// platform shell in the instance directory.
pub struct NpmInstaller {
    command: String,
}

impl NpmInstaller {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for NpmInstaller {
    fn default() -> Self {
        Self::new("npm install")
    }
}

#[async_trait]
impl DependencyInstaller for NpmInstaller {
    async fn install(&self, dir: &Path) -> Result<()> {
        let (shell, shell_arg) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        let output = Command::new(shell)
            .arg(shell_arg)
            .arg(&self.command)
            .current_dir(dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::Install(format!("Failed to run '{}': {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Install(format!(
                "'{}' failed: {}",
                self.command,
                stderr.trim()
            )));
        }

        info!("Installed dependencies in {}", dir.display());
        Ok(())
    }
}
