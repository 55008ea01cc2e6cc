//! Process Supervisor - owns the live-process table
//!
//! Features:
//! - At-most-one-running per instance id, enforced by a per-id lock
//!   spanning the whole check-then-spawn sequence
//! - Exit watcher that prunes the table when a process terminates for any
//!   reason (normal exit, crash, external kill)
//! - Synchronous forceful stop (handle removed before the kill resolves)

use cloudhost_foundation::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Exit watcher poll interval
const WATCH_INTERVAL: Duration = Duration::from_millis(200);

/// Per-key async locks. Entries are created on demand and kept for the
/// supervisor's lifetime (instance counts are small).
#[derive(Default)]
pub(crate) struct KeyedMutex {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedMutex {
    pub(crate) async fn acquire(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Live process entry. Transient, in-memory only; absence from the table is
/// the sole source of truth for "stopped".
struct ProcessHandle {
    child: Child,
}

/// Supervisor for hosted instance processes.
pub struct ProcessSupervisor {
    /// Running processes by instance id
    processes: Arc<RwLock<HashMap<String, Arc<Mutex<ProcessHandle>>>>>,

    /// Per-id spawn locks (check-then-spawn must not interleave)
    spawn_locks: Arc<KeyedMutex>,

    /// Runtime command used to launch entry files
    runtime: String,
}

impl ProcessSupervisor {
    pub fn new(runtime: impl Into<String>) -> Self {
        Self {
            processes: Arc::new(RwLock::new(HashMap::with_capacity(16))),
            spawn_locks: Arc::new(KeyedMutex::default()),
            runtime: runtime.into(),
        }
    }

    /// Spawn the instance process.
    ///
    /// Fails with `Error::Spawn` if a handle already exists for `id`
    /// ("already running" is reported, never re-spawned). Env pairs are
    /// applied in order, so a later duplicate name wins.
    pub async fn spawn(
        &self,
        id: &str,
        dir: &Path,
        entry: &str,
        env: &[(String, String)],
    ) -> Result<()> {
        let _guard = self.spawn_locks.acquire(id).await;

        if self.processes.read().await.contains_key(id) {
            return Err(Error::spawn(id, "already running"));
        }

        let mut command = Command::new(&self.runtime);
        command.arg(entry).current_dir(dir);
        for (name, value) in env {
            command.env(name, value);
        }

        let child = command
            .spawn()
            .map_err(|e| Error::spawn(id, e.to_string()))?;

        info!("Started instance {} ({} {})", id, self.runtime, entry);

        let handle = Arc::new(Mutex::new(ProcessHandle { child }));
        self.processes
            .write()
            .await
            .insert(id.to_string(), Arc::clone(&handle));

        self.watch_exit(id.to_string(), handle);
        Ok(())
    }

    /// Watcher task: poll the child until it terminates, then prune the
    /// table entry. If `stop` removed the entry first, the watcher just
    /// stops - the later removal is a no-op.
    fn watch_exit(&self, id: String, handle: Arc<Mutex<ProcessHandle>>) {
        let processes = Arc::clone(&self.processes);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(WATCH_INTERVAL).await;

                if !processes.read().await.contains_key(&id) {
                    debug!("Instance {} removed externally, watcher exiting", id);
                    return;
                }

                let status = {
                    let mut handle = handle.lock().await;
                    handle.child.try_wait()
                };

                match status {
                    Ok(Some(status)) => {
                        info!("Instance {} exited with {}", id, status);
                        processes.write().await.remove(&id);
                        return;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Instance {} watcher error: {}", id, e);
                        processes.write().await.remove(&id);
                        return;
                    }
                }
            }
        });
    }

    /// Forcefully stop a running instance.
    ///
    /// The handle is removed immediately; the kill itself is best-effort
    /// (an already-dead process is not an error).
    pub async fn stop(&self, id: &str) -> Result<()> {
        let handle = self.processes.write().await.remove(id);
        let Some(handle) = handle else {
            return Err(Error::NotRunning(id.to_string()));
        };

        let mut handle = handle.lock().await;
        if let Err(e) = handle.child.kill().await {
            warn!("Failed to kill instance {}: {}", id, e);
        }

        info!("Stopped instance {}", id);
        Ok(())
    }

    /// Whether a process handle exists for `id`.
    pub async fn is_running(&self, id: &str) -> bool {
        self.processes.read().await.contains_key(id)
    }

    /// Ids of all currently-running instances.
    pub async fn running_ids(&self) -> Vec<String> {
        self.processes.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The tests use `sleep` as the runtime so the "entry file" is just the
    // duration argument.
    fn supervisor() -> ProcessSupervisor {
        ProcessSupervisor::new("sleep")
    }

    #[tokio::test]
    async fn test_spawn_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor();

        sup.spawn("app", dir.path(), "5", &[]).await.unwrap();
        assert!(sup.is_running("app").await);
        assert_eq!(sup.running_ids().await, ["app"]);

        sup.stop("app").await.unwrap();
        assert!(!sup.is_running("app").await);
    }

    #[tokio::test]
    async fn test_double_spawn_reports_already_running() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor();

        sup.spawn("app", dir.path(), "5", &[]).await.unwrap();
        let second = sup.spawn("app", dir.path(), "5", &[]).await;
        assert!(matches!(second, Err(Error::Spawn { .. })));

        // stop then spawn again succeeds
        sup.stop("app").await.unwrap();
        sup.spawn("app", dir.path(), "5", &[]).await.unwrap();
        sup.stop("app").await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_not_running() {
        let sup = supervisor();
        let result = sup.stop("ghost").await;
        assert!(matches!(result, Err(Error::NotRunning(_))));
    }

    #[tokio::test]
    async fn test_exit_watcher_prunes_table() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor();

        sup.spawn("short", dir.path(), "0.1", &[]).await.unwrap();
        assert!(sup.is_running("short").await);

        // Give the process time to exit and the watcher time to notice
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!sup.is_running("short").await);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let sup = ProcessSupervisor::new("/nonexistent/runtime");

        let result = sup.spawn("app", dir.path(), "entry.js", &[]).await;
        assert!(matches!(result, Err(Error::Spawn { .. })));
        assert!(!sup.is_running("app").await);
    }

    #[tokio::test]
    async fn test_concurrent_spawns_single_winner() {
        let dir = tempfile::tempdir().unwrap();
        let sup = Arc::new(supervisor());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let sup = Arc::clone(&sup);
            let path = dir.path().to_path_buf();
            handles.push(tokio::spawn(async move {
                sup.spawn("race", &path, "5", &[]).await.is_ok()
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        sup.stop("race").await.unwrap();
    }
}
