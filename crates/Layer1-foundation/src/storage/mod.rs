//! Storage - JSON 레코드 저장소
//!
//! - `JsonStore`: 범용 key(파일명) → JSON 저장소
//! - `Records`: 호스팅/사용량/프리미엄 레코드 캐시

pub mod records;
pub mod store;

pub use records::{
    EntitlementSet, OwnershipMap, Records, UsageCounters, HOSTED_FILE, PREMIUM_FILE, USAGE_FILE,
};
pub use store::JsonStore;
