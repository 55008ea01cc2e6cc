//! Error types for CloudHost
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// CloudHost 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 저장소 관련
    // ========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // 호스팅 생성 관련
    // ========================================================================
    #[error("Hosting quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Source acquisition failed: {0}")]
    Acquisition(String),

    #[error("Dependency install failed: {0}")]
    Install(String),

    // ========================================================================
    // 프로세스 관련
    // ========================================================================
    #[error("Spawn failed: {instance} - {message}")]
    Spawn { instance: String, message: String },

    #[error("Instance not running: {0}")]
    NotRunning(String),

    // ========================================================================
    // 권한 관련
    // ========================================================================
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Spawn 에러 생성 헬퍼
    pub fn spawn(instance: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Spawn {
            instance: instance.into(),
            message: message.into(),
        }
    }

    /// 생성 시퀀스에서 "등록은 하되 미기동" 으로 강등되는 에러인지 확인
    ///
    /// Install/Spawn 실패는 인스턴스 등록 자체를 막지 않는다 (degraded success).
    pub fn is_degradable(&self) -> bool {
        matches!(self, Error::Install(_) | Error::Spawn { .. })
    }

    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::QuotaExceeded(_)
                | Error::PermissionDenied(_)
                | Error::NotFound(_)
                | Error::NotRunning(_)
                | Error::InvalidInput(_)
        )
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
