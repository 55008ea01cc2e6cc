//! Hosting Orchestrator - the instance lifecycle root
//!
//! Sequences acquisition → env materialization → install → spawn, keeps the
//! ownership/usage/entitlement records, and exposes the lifecycle API the
//! front end consumes (create, start, stop, delete, list, entitlements,
//! env sessions).
//!
//! Creation semantics:
//! - Quota and acquisition failures abort before any record is touched.
//! - Install and spawn failures degrade: the instance is registered and
//!   visible, but reported as not started with a reason.
//! - Records are saved after every mutation; a failed save is logged and
//!   never rolls the in-memory state back.

use crate::envfile::{read_env_file, write_env_file};
use crate::install::{probe, DependencyInstaller};
use crate::quota::may_create;
use crate::session::{EnvSession, EnvSessionManager};
use crate::source::{instance_dir, resolve_id, SourceDescriptor, SourceFetcher};
use crate::supervisor::{KeyedMutex, ProcessSupervisor};
use cloudhost_foundation::{CloudHostConfig, Error, JsonStore, Records, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

// ============================================================================
// Reports
// ============================================================================

/// Terminal report of a creation attempt that got past the gate and the
/// acquisition step. `started = false` with a reason is a degraded success:
/// the instance is hosted but could not be started.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceReport {
    pub id: String,
    pub started: bool,
    pub reason: String,
}

/// One row of the owner's instance list.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceStatus {
    pub id: String,
    pub running: bool,
}

/// Outcome of a delete. The ownership record is always gone; the directory
/// may linger when removal fails.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub id: String,
    pub directory_removed: bool,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Root component owning all hosting state.
pub struct HostingOrchestrator {
    config: CloudHostConfig,
    instances_dir: PathBuf,
    records: RwLock<Records>,
    supervisor: ProcessSupervisor,
    fetcher: Arc<dyn SourceFetcher>,
    installer: Arc<dyn DependencyInstaller>,
    sessions: EnvSessionManager,

    /// Per-owner creation locks: id resolution and registration for one
    /// owner must not interleave across concurrent creations.
    owner_locks: KeyedMutex,
}

impl HostingOrchestrator {
    pub fn new(
        config: CloudHostConfig,
        store: JsonStore,
        fetcher: Arc<dyn SourceFetcher>,
        installer: Arc<dyn DependencyInstaller>,
    ) -> Self {
        let instances_dir = config.resolve_instances_dir(store.base_dir());
        let supervisor = ProcessSupervisor::new(&config.runtime);
        let records = Records::load(store);

        Self {
            config,
            instances_dir,
            records: RwLock::new(records),
            supervisor,
            fetcher,
            installer,
            sessions: EnvSessionManager::new(),
            owner_locks: KeyedMutex::default(),
        }
    }

    pub fn instances_dir(&self) -> &PathBuf {
        &self.instances_dir
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Host a new instance from a descriptor.
    ///
    /// Quota and acquisition failures return an error with no side effects
    /// on the records (an orphan directory from a partial acquisition is
    /// tolerated). Install and spawn failures still register the instance.
    pub async fn create_instance(
        &self,
        owner: &str,
        descriptor: &SourceDescriptor,
        env_pairs: &[(String, String)],
    ) -> Result<InstanceReport> {
        let _owner_guard = self.owner_locks.acquire(owner).await;

        // 1. Quota gate
        {
            let records = self.records.read().await;
            if !may_create(&records, owner, self.config.free_tier_limit) {
                return Err(Error::QuotaExceeded(format!(
                    "Limit of {} hosted instance(s) reached",
                    self.config.free_tier_limit
                )));
            }
        }

        // 2. Acquire source
        let id = {
            let records = self.records.read().await;
            resolve_id(records.instances(owner), &descriptor.base_name())
        };
        let dir = instance_dir(&self.instances_dir, &id);
        self.fetcher.fetch(descriptor, &dir).await?;

        // 3. Materialize environment
        if !env_pairs.is_empty() {
            write_env_file(&dir, env_pairs)?;
        }

        // 4. Probe + install (failures degrade, never abort registration)
        let mut outcome = probe(&dir, &self.config.default_entry);
        if outcome.started_candidate {
            if let Err(e) = self.installer.install(&dir).await {
                warn!("Install failed for {}: {}", id, e);
                outcome.started_candidate = false;
                outcome.main_entry = None;
                outcome.reason = e.to_string();
            }
        }

        // 5. Register, regardless of startability
        {
            let mut records = self.records.write().await;
            if let Err(e) = records.add_instance(owner, &id) {
                warn!("Could not persist ownership record: {}", e);
            }
            if let Err(e) = records.increment_usage(owner) {
                warn!("Could not persist usage record: {}", e);
            }
        }

        // 6. Spawn if startable
        let mut started = false;
        let mut reason = outcome.reason;
        if let Some(entry) = outcome.main_entry.as_deref() {
            match self.supervisor.spawn(&id, &dir, entry, env_pairs).await {
                Ok(()) => started = true,
                Err(e) => {
                    warn!("Spawn failed for {}: {}", id, e);
                    reason = e.to_string();
                }
            }
        }

        info!(
            "Hosted instance {} for {} (started: {})",
            id, owner, started
        );
        Ok(InstanceReport { id, started, reason })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start an already-hosted instance, re-reading its env file.
    pub async fn start_instance(&self, owner: &str, id: &str) -> Result<()> {
        self.ensure_owned(owner, id).await?;

        let dir = instance_dir(&self.instances_dir, id);
        let outcome = probe(&dir, &self.config.default_entry);
        let Some(entry) = outcome.main_entry.as_deref() else {
            return Err(Error::spawn(id, outcome.reason));
        };

        let env = read_env_file(&dir)?;
        self.supervisor.spawn(id, &dir, entry, &env).await
    }

    /// Forcefully stop a running instance.
    pub async fn stop_instance(&self, owner: &str, id: &str) -> Result<()> {
        self.ensure_owned(owner, id).await?;
        self.supervisor.stop(id).await
    }

    /// Delete an instance: stop it if running, drop the ownership record,
    /// then best-effort remove the directory. A failed directory removal is
    /// reported but never resurrects the record.
    pub async fn delete_instance(&self, owner: &str, id: &str) -> Result<DeleteReport> {
        self.ensure_owned(owner, id).await?;

        if self.supervisor.is_running(id).await {
            if let Err(e) = self.supervisor.stop(id).await {
                warn!("Could not stop {} during delete: {}", id, e);
            }
        }

        {
            let mut records = self.records.write().await;
            if let Err(e) = records.remove_instance(owner, id) {
                warn!("Could not persist ownership record: {}", e);
            }
        }

        let dir = instance_dir(&self.instances_dir, id);
        let directory_removed = match std::fs::remove_dir_all(&dir) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!("Could not remove {}: {}", dir.display(), e);
                false
            }
        };

        info!("Deleted instance {} for {}", id, owner);
        Ok(DeleteReport {
            id: id.to_string(),
            directory_removed,
        })
    }

    /// All of the owner's instances with their running state, in creation
    /// order.
    pub async fn list_instances(&self, owner: &str) -> Vec<InstanceStatus> {
        let ids: Vec<String> = {
            let records = self.records.read().await;
            records.instances(owner).to_vec()
        };

        let mut statuses = Vec::with_capacity(ids.len());
        for id in ids {
            let running = self.supervisor.is_running(&id).await;
            statuses.push(InstanceStatus { id, running });
        }
        statuses
    }

    /// Status of one instance (the settings view).
    pub async fn instance_status(&self, owner: &str, id: &str) -> Result<InstanceStatus> {
        self.ensure_owned(owner, id).await?;
        Ok(InstanceStatus {
            id: id.to_string(),
            running: self.supervisor.is_running(id).await,
        })
    }

    async fn ensure_owned(&self, owner: &str, id: &str) -> Result<()> {
        let records = self.records.read().await;
        if !records.owns(owner, id) {
            return Err(Error::NotFound(format!("Instance '{}' not found", id)));
        }
        Ok(())
    }

    // ========================================================================
    // Entitlements
    // ========================================================================

    pub async fn check_entitlement(&self, owner: &str) -> bool {
        self.records.read().await.is_entitled(owner)
    }

    /// Grant unlimited creation. Restricted to the configured admin id.
    /// Returns false when the target was already entitled.
    pub async fn grant_entitlement(&self, admin: &str, target: &str) -> Result<bool> {
        if admin != self.config.admin_owner_id {
            return Err(Error::PermissionDenied(
                "Only the administrator can grant premium".to_string(),
            ));
        }

        let mut records = self.records.write().await;
        match records.grant_entitlement(target) {
            Ok(newly) => {
                if newly {
                    info!("Granted premium to {}", target);
                }
                Ok(newly)
            }
            Err(e) => {
                // in-memory grant already applied
                warn!("Could not persist entitlement record: {}", e);
                Ok(true)
            }
        }
    }

    // ========================================================================
    // Env-collection sessions
    // ========================================================================

    pub async fn begin_env_session(&self, owner: &str, descriptor: SourceDescriptor) {
        self.sessions.begin(owner, descriptor).await;
    }

    pub async fn add_env_pair(&self, owner: &str, name: &str, value: &str) -> Result<usize> {
        self.sessions.add_pair(owner, name, value).await
    }

    pub async fn env_session_pairs(&self, owner: &str) -> Option<Vec<(String, String)>> {
        self.sessions.pairs(owner).await
    }

    /// Submit the owner's session: the session is consumed unconditionally,
    /// then the normal creation sequence runs with its descriptor and pairs.
    pub async fn submit_env_session(&self, owner: &str) -> Result<InstanceReport> {
        let EnvSession { descriptor, pairs } = self
            .sessions
            .take(owner)
            .await
            .ok_or_else(|| Error::NotFound(format!("No env session for {}", owner)))?;

        self.create_instance(owner, &descriptor, &pairs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;

    /// Fetcher double that materializes a fixed file set.
    struct FakeFetcher {
        files: Vec<(&'static str, &'static str)>,
    }

    #[async_trait]
    impl SourceFetcher for FakeFetcher {
        async fn fetch(&self, _descriptor: &SourceDescriptor, dest: &Path) -> Result<()> {
            tokio::fs::create_dir_all(dest).await?;
            for (name, content) in &self.files {
                tokio::fs::write(dest.join(name), content).await?;
            }
            Ok(())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl SourceFetcher for FailingFetcher {
        async fn fetch(&self, _descriptor: &SourceDescriptor, _dest: &Path) -> Result<()> {
            Err(Error::Acquisition("Failed to clone repository".to_string()))
        }
    }

    struct OkInstaller;

    #[async_trait]
    impl DependencyInstaller for OkInstaller {
        async fn install(&self, _dir: &Path) -> Result<()> {
            Ok(())
        }
    }

    struct FailingInstaller;

    #[async_trait]
    impl DependencyInstaller for FailingInstaller {
        async fn install(&self, _dir: &Path) -> Result<()> {
            Err(Error::Install("npm install failed".to_string()))
        }
    }

    fn test_config(dir: &Path) -> CloudHostConfig {
        let mut config = CloudHostConfig::default();
        // `sleep` as the runtime lets the "entry file" double as a duration
        config.runtime = "sleep".to_string();
        config.instances_dir = Some(dir.join("instances"));
        config.admin_owner_id = "admin-1".to_string();
        config
    }

    fn orchestrator(
        dir: &Path,
        fetcher: Arc<dyn SourceFetcher>,
        installer: Arc<dyn DependencyInstaller>,
    ) -> HostingOrchestrator {
        let store = JsonStore::new(dir.join("data"));
        HostingOrchestrator::new(test_config(dir), store, fetcher, installer)
    }

    fn repo_descriptor() -> SourceDescriptor {
        SourceDescriptor::Repository {
            url: "https://github.com/user/my-app.git".into(),
        }
    }

    /// A startable fixture: manifest points at "5", which exists and makes
    /// `sleep 5` the spawned process.
    fn startable_fetcher() -> Arc<dyn SourceFetcher> {
        Arc::new(FakeFetcher {
            files: vec![("package.json", r#"{"main": "5"}"#), ("5", "")],
        })
    }

    #[tokio::test]
    async fn test_create_without_manifest_is_degraded_success() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Arc::new(FakeFetcher { files: vec![] }), Arc::new(OkInstaller));

        let report = orch
            .create_instance("owner-a", &repo_descriptor(), &[])
            .await
            .unwrap();

        assert_eq!(report.id, "my-app");
        assert!(!report.started);
        assert!(report.reason.contains("package.json"));

        let list = orch.list_instances("owner-a").await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "my-app");
        assert!(!list[0].running);
    }

    #[tokio::test]
    async fn test_second_creation_hits_quota() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Arc::new(FakeFetcher { files: vec![] }), Arc::new(OkInstaller));

        orch.create_instance("owner-a", &repo_descriptor(), &[])
            .await
            .unwrap();
        let second = orch.create_instance("owner-a", &repo_descriptor(), &[]).await;

        assert!(matches!(second, Err(Error::QuotaExceeded(_))));
        assert_eq!(orch.list_instances("owner-a").await.len(), 1);
    }

    #[tokio::test]
    async fn test_entitled_owner_gets_suffixed_ids() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Arc::new(FakeFetcher { files: vec![] }), Arc::new(OkInstaller));

        orch.grant_entitlement("admin-1", "owner-b").await.unwrap();

        let first = orch
            .create_instance("owner-b", &repo_descriptor(), &[])
            .await
            .unwrap();
        let second = orch
            .create_instance("owner-b", &repo_descriptor(), &[])
            .await
            .unwrap();

        assert_eq!(first.id, "my-app");
        assert_eq!(second.id, "my-app_1");

        let ids: Vec<String> = orch
            .list_instances("owner-b")
            .await
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, ["my-app", "my-app_1"]);
    }

    #[tokio::test]
    async fn test_acquisition_failure_leaves_no_records() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Arc::new(FailingFetcher), Arc::new(OkInstaller));

        let result = orch.create_instance("owner-a", &repo_descriptor(), &[]).await;
        assert!(matches!(result, Err(Error::Acquisition(_))));
        assert!(orch.list_instances("owner-a").await.is_empty());

        // gate still open: the failed attempt consumed no quota
        let report = {
            let orch = orchestrator(
                dir.path(),
                Arc::new(FakeFetcher { files: vec![] }),
                Arc::new(OkInstaller),
            );
            orch.create_instance("owner-a", &repo_descriptor(), &[])
                .await
                .unwrap()
        };
        assert_eq!(report.id, "my-app");
    }

    #[tokio::test]
    async fn test_install_failure_degrades_but_registers() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), startable_fetcher(), Arc::new(FailingInstaller));

        let report = orch
            .create_instance("owner-a", &repo_descriptor(), &[])
            .await
            .unwrap();

        assert!(!report.started);
        assert!(report.reason.contains("npm install failed"));
        assert_eq!(orch.list_instances("owner-a").await.len(), 1);
    }

    #[tokio::test]
    async fn test_full_lifecycle_start_stop_restart() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), startable_fetcher(), Arc::new(OkInstaller));

        let report = orch
            .create_instance("owner-a", &repo_descriptor(), &[])
            .await
            .unwrap();
        assert!(report.started);

        let status = orch.instance_status("owner-a", &report.id).await.unwrap();
        assert!(status.running);

        // start while running is reported, not re-spawned
        let again = orch.start_instance("owner-a", &report.id).await;
        assert!(matches!(again, Err(Error::Spawn { .. })));

        orch.stop_instance("owner-a", &report.id).await.unwrap();
        assert!(!orch.instance_status("owner-a", &report.id).await.unwrap().running);

        orch.start_instance("owner-a", &report.id).await.unwrap();
        assert!(orch.instance_status("owner-a", &report.id).await.unwrap().running);
        orch.stop_instance("owner-a", &report.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_start_unknown_instance() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), startable_fetcher(), Arc::new(OkInstaller));

        let result = orch.start_instance("owner-a", "ghost").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), startable_fetcher(), Arc::new(OkInstaller));

        let report = orch
            .create_instance("owner-a", &repo_descriptor(), &[])
            .await
            .unwrap();
        let instance_path = orch.instances_dir().join(&report.id);
        assert!(instance_path.exists());

        let deleted = orch.delete_instance("owner-a", &report.id).await.unwrap();
        assert!(deleted.directory_removed);
        assert!(!instance_path.exists());
        assert!(orch.list_instances("owner-a").await.is_empty());

        // second delete: the id no longer resolves
        let again = orch.delete_instance("owner-a", &report.id).await;
        assert!(matches!(again, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_env_pairs_materialized_and_reapplied() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(
            dir.path(),
            Arc::new(FakeFetcher { files: vec![] }),
            Arc::new(OkInstaller),
        );

        let pairs = vec![
            ("TOKEN".to_string(), "a=b".to_string()),
            ("MODE".to_string(), "prod".to_string()),
        ];
        let report = orch
            .create_instance("owner-a", &repo_descriptor(), &pairs)
            .await
            .unwrap();

        let instance_path = orch.instances_dir().join(&report.id);
        assert_eq!(read_env_file(&instance_path).unwrap(), pairs);
    }

    #[tokio::test]
    async fn test_env_session_flow() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(
            dir.path(),
            Arc::new(FakeFetcher { files: vec![] }),
            Arc::new(OkInstaller),
        );

        orch.begin_env_session("owner-a", repo_descriptor()).await;
        orch.add_env_pair("owner-a", "TOKEN", "abc").await.unwrap();
        orch.add_env_pair("owner-a", "PORT", "3000").await.unwrap();

        let report = orch.submit_env_session("owner-a").await.unwrap();
        assert_eq!(report.id, "my-app");

        // session consumed, whether or not creation succeeded
        assert!(matches!(
            orch.submit_env_session("owner-a").await,
            Err(Error::NotFound(_))
        ));

        let instance_path = orch.instances_dir().join(&report.id);
        let env = read_env_file(&instance_path).unwrap();
        assert_eq!(env.len(), 2);
        assert_eq!(env[0], ("TOKEN".to_string(), "abc".to_string()));
    }

    #[tokio::test]
    async fn test_grant_entitlement_admin_only() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(
            dir.path(),
            Arc::new(FakeFetcher { files: vec![] }),
            Arc::new(OkInstaller),
        );

        let denied = orch.grant_entitlement("owner-a", "owner-b").await;
        assert!(matches!(denied, Err(Error::PermissionDenied(_))));

        assert!(orch.grant_entitlement("admin-1", "owner-b").await.unwrap());
        assert!(!orch.grant_entitlement("admin-1", "owner-b").await.unwrap());
        assert!(orch.check_entitlement("owner-b").await);
        assert!(!orch.check_entitlement("owner-a").await);
    }
}
