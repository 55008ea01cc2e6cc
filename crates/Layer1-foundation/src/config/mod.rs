//! CloudHost Config - 통합 설정
//!
//! JsonStore 를 통해 로드/저장되는 단일 설정 파일

use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 설정 파일명
pub const CONFIG_FILE: &str = "config.json";

/// CloudHost 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudHostConfig {
    /// 버전 (마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,

    /// 인스턴스 디렉토리 (미지정 시 데이터 디렉토리 아래 `hosted_apps`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instances_dir: Option<PathBuf>,

    /// 무료 티어에서 허용되는 평생 생성 횟수
    #[serde(default = "default_free_tier_limit")]
    pub free_tier_limit: u64,

    /// 매니페스트에 main 이 없을 때 사용하는 엔트리 파일
    #[serde(default = "default_entry")]
    pub default_entry: String,

    /// 호스팅 프로세스 런타임 커맨드
    #[serde(default = "default_runtime")]
    pub runtime: String,

    /// 의존성 설치 커맨드
    #[serde(default = "default_install_command")]
    pub install_command: String,

    /// 프리미엄 부여 권한을 가진 단일 관리자 id
    #[serde(default = "default_admin_owner_id")]
    pub admin_owner_id: String,
}

fn default_version() -> u32 {
    1
}

fn default_free_tier_limit() -> u64 {
    1
}

fn default_entry() -> String {
    "index.js".to_string()
}

fn default_runtime() -> String {
    "node".to_string()
}

fn default_install_command() -> String {
    "npm install".to_string()
}

fn default_admin_owner_id() -> String {
    "1045370637776064612".to_string()
}

impl Default for CloudHostConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            instances_dir: None,
            free_tier_limit: default_free_tier_limit(),
            default_entry: default_entry(),
            runtime: default_runtime(),
            install_command: default_install_command(),
            admin_owner_id: default_admin_owner_id(),
        }
    }
}

impl CloudHostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 글로벌 설정 로드 (없으면 기본값)
    pub fn load() -> Result<Self> {
        let store = JsonStore::global()?;
        Ok(store.load_or_default(CONFIG_FILE))
    }

    /// 지정된 저장소에서 로드
    pub fn load_from(store: &JsonStore) -> Self {
        store.load_or_default(CONFIG_FILE)
    }

    /// 글로벌 설정 저장
    pub fn save_global(&self) -> Result<()> {
        let store = JsonStore::global()?;
        store.save(CONFIG_FILE, self)
    }

    /// 인스턴스 디렉토리 해석 (`base` = 데이터 디렉토리)
    pub fn resolve_instances_dir(&self, base: &Path) -> PathBuf {
        match &self.instances_dir {
            Some(dir) => dir.clone(),
            None => base.join("hosted_apps"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CloudHostConfig::default();
        assert_eq!(config.free_tier_limit, 1);
        assert_eq!(config.default_entry, "index.js");
        assert_eq!(config.runtime, "node");
        assert_eq!(config.install_command, "npm install");
    }

    #[test]
    fn test_resolve_instances_dir() {
        let mut config = CloudHostConfig::default();
        let base = Path::new("/data/cloudhost");
        assert_eq!(
            config.resolve_instances_dir(base),
            PathBuf::from("/data/cloudhost/hosted_apps")
        );

        config.instances_dir = Some(PathBuf::from("/srv/apps"));
        assert_eq!(config.resolve_instances_dir(base), PathBuf::from("/srv/apps"));
    }

    #[test]
    fn test_roundtrip_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        let mut config = CloudHostConfig::default();
        config.free_tier_limit = 3;
        store.save(CONFIG_FILE, &config).unwrap();

        let loaded = CloudHostConfig::load_from(&store);
        assert_eq!(loaded.free_tier_limit, 3);
        assert_eq!(loaded.default_entry, "index.js");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        std::fs::write(
            store.file_path(CONFIG_FILE),
            r#"{"freeTierLimit": 5}"#,
        )
        .unwrap();

        let loaded = CloudHostConfig::load_from(&store);
        assert_eq!(loaded.free_tier_limit, 5);
        assert_eq!(loaded.runtime, "node");
    }
}
