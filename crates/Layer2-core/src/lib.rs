//! # cloudhost-core
//!
//! Core hosting layer for CloudHost:
//! - Source: 소스 획득 (zip 아카이브 / git 저장소)
//! - Install: 매니페스트 프로브 + 의존성 설치
//! - Supervisor: 프로세스 감독 (spawn / stop / exit watcher)
//! - Orchestrator: 인스턴스 생명주기 루트 (HostingOrchestrator)

pub mod envfile;
pub mod install;
pub mod orchestrator;
pub mod quota;
pub mod session;
pub mod source;
pub mod supervisor;

// ============================================================================
// Source (소스 획득)
// ============================================================================
pub use source::{instance_dir, resolve_id, FetchError, ShellFetcher, SourceDescriptor, SourceFetcher};

// ============================================================================
// Install (설치)
// ============================================================================
pub use install::{probe, DependencyInstaller, InstallOutcome, NpmInstaller, MANIFEST_FILE};

// ============================================================================
// Env (환경 변수)
// ============================================================================
pub use envfile::{read_env_file, write_env_file, ENV_FILE};
pub use session::{EnvSession, EnvSessionManager};

// ============================================================================
// Supervisor (프로세스 감독)
// ============================================================================
pub use supervisor::ProcessSupervisor;

// ============================================================================
// Quota (할당량)
// ============================================================================
pub use quota::may_create;

// ============================================================================
// Orchestrator (생명주기 루트)
// ============================================================================
pub use orchestrator::{DeleteReport, HostingOrchestrator, InstanceReport, InstanceStatus};
