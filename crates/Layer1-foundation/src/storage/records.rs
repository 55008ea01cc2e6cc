//! Persisted hosting records
//!
//! Three durable records, each one JSON file in the data directory:
//! - ownership map: owner id -> ordered list of instance ids
//! - usage counters: owner id -> lifetime creation count (never decremented)
//! - entitlement set: owner ids with unlimited creations
//!
//! The in-memory copy is authoritative. Every mutation saves immediately;
//! a failed save is returned to the caller but does NOT roll the memory
//! back (accepted eventual-consistency risk, callers log a warning).

use crate::storage::JsonStore;
use crate::Result;
use std::collections::HashMap;

/// 호스팅 목록 파일명
pub const HOSTED_FILE: &str = "hosted.json";
/// 사용량 카운터 파일명
pub const USAGE_FILE: &str = "usage.json";
/// 프리미엄(무제한 생성) 파일명
pub const PREMIUM_FILE: &str = "premium.json";

/// owner id -> ordered instance ids
pub type OwnershipMap = HashMap<String, Vec<String>>;
/// owner id -> lifetime creation count
pub type UsageCounters = HashMap<String, u64>;
/// owner ids granted unlimited creation (stored as a JSON array)
pub type EntitlementSet = Vec<String>;

/// In-memory record caches plus their backing store.
#[derive(Debug)]
pub struct Records {
    store: JsonStore,
    hosted: OwnershipMap,
    usage: UsageCounters,
    premium: EntitlementSet,
}

impl Records {
    /// Load all three records, missing files default to empty.
    pub fn load(store: JsonStore) -> Self {
        let hosted = store.load_or_default(HOSTED_FILE);
        let usage = store.load_or_default(USAGE_FILE);
        let premium = store.load_or_default(PREMIUM_FILE);
        Self {
            store,
            hosted,
            usage,
            premium,
        }
    }

    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    // ========================================================================
    // Ownership
    // ========================================================================

    /// Instance ids owned by `owner`, in creation order.
    pub fn instances(&self, owner: &str) -> &[String] {
        self.hosted.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn owns(&self, owner: &str, id: &str) -> bool {
        self.instances(owner).iter().any(|i| i == id)
    }

    /// Append an instance id and persist the ownership map.
    pub fn add_instance(&mut self, owner: &str, id: &str) -> Result<()> {
        self.hosted
            .entry(owner.to_string())
            .or_default()
            .push(id.to_string());
        self.store.save(HOSTED_FILE, &self.hosted)
    }

    /// Remove an instance id and persist. Returns false if it was not listed.
    pub fn remove_instance(&mut self, owner: &str, id: &str) -> Result<bool> {
        let Some(list) = self.hosted.get_mut(owner) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|i| i != id);
        if list.len() == before {
            return Ok(false);
        }
        self.store.save(HOSTED_FILE, &self.hosted)?;
        Ok(true)
    }

    // ========================================================================
    // Usage
    // ========================================================================

    pub fn usage(&self, owner: &str) -> u64 {
        self.usage.get(owner).copied().unwrap_or(0)
    }

    /// Increment the lifetime creation counter and persist.
    pub fn increment_usage(&mut self, owner: &str) -> Result<()> {
        *self.usage.entry(owner.to_string()).or_insert(0) += 1;
        self.store.save(USAGE_FILE, &self.usage)
    }

    // ========================================================================
    // Entitlement
    // ========================================================================

    pub fn is_entitled(&self, owner: &str) -> bool {
        self.premium.iter().any(|o| o == owner)
    }

    pub fn entitlements(&self) -> &[String] {
        &self.premium
    }

    /// Grant unlimited creation. Returns false (without saving) if the owner
    /// was already entitled.
    pub fn grant_entitlement(&mut self, owner: &str) -> Result<bool> {
        if self.is_entitled(owner) {
            return Ok(false);
        }
        self.premium.push(owner.to_string());
        self.store.save(PREMIUM_FILE, &self.premium)?;
        Ok(true)
    }
}
