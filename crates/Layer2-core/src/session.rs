//! Env-Collection Session
//!
//! Ephemeral per-owner wizard state: the owner picks a descriptor, adds
//! env pairs one at a time, then submits. Sessions live only in memory -
//! a restart mid-session loses them (accepted limitation) - and are
//! removed unconditionally on submit, whether the creation that follows
//! succeeds or fails. No timeout.

use crate::source::SourceDescriptor;
use cloudhost_foundation::{Error, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Accumulated state of one owner's hosting wizard.
#[derive(Debug, Clone)]
pub struct EnvSession {
    pub descriptor: SourceDescriptor,
    /// Ordered as supplied; duplicate names are retained, last one wins
    /// when the environment is materialized.
    pub pairs: Vec<(String, String)>,
}

/// Per-owner session table.
#[derive(Default)]
pub struct EnvSessionManager {
    sessions: RwLock<HashMap<String, EnvSession>>,
}

impl EnvSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for `owner`. Any stale session is replaced.
    pub async fn begin(&self, owner: &str, descriptor: SourceDescriptor) {
        debug!("Env session started for {}", owner);
        self.sessions.write().await.insert(
            owner.to_string(),
            EnvSession {
                descriptor,
                pairs: Vec::new(),
            },
        );
    }

    /// Append one validated pair. Returns the pair count so far.
    pub async fn add_pair(&self, owner: &str, name: &str, value: &str) -> Result<usize> {
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "Environment variable name cannot be empty".to_string(),
            ));
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(owner)
            .ok_or_else(|| Error::NotFound(format!("No env session for {}", owner)))?;
        session.pairs.push((name.to_string(), value.to_string()));
        Ok(session.pairs.len())
    }

    /// Snapshot of the pairs collected so far (for front-end display).
    pub async fn pairs(&self, owner: &str) -> Option<Vec<(String, String)>> {
        self.sessions
            .read()
            .await
            .get(owner)
            .map(|s| s.pairs.clone())
    }

    /// Remove and return the session. The caller runs the creation
    /// sequence; the session is gone either way.
    pub async fn take(&self, owner: &str) -> Option<EnvSession> {
        self.sessions.write().await.remove(owner)
    }

    pub async fn is_active(&self, owner: &str) -> bool {
        self.sessions.read().await.contains_key(owner)
    }
}
