//! # cloudhost-foundation
//!
//! Foundation layer for CloudHost:
//! - Error: 중앙 에러 타입 (`Error`, `Result`)
//! - Storage: JsonStore (범용) + Records (호스팅/사용량/프리미엄 캐시)
//! - Config: 통합 설정 (CloudHostConfig)

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{CloudHostConfig, CONFIG_FILE};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{
    EntitlementSet,
    // JSON (범용)
    JsonStore,
    OwnershipMap,
    // Records (영속 레코드 캐시)
    Records,
    UsageCounters,
    HOSTED_FILE,
    PREMIUM_FILE,
    USAGE_FILE,
};
