//! Quota & Entitlement Gate
//!
//! Decides whether an owner may create a new instance. Consulted only at
//! creation time, never at start/stop. The free tier allows `free_limit`
//! lifetime creations (default 1); entitled owners are unlimited.

use cloudhost_foundation::Records;

/// True iff the owner is entitled or still under the free-tier limit.
pub fn may_create(records: &Records, owner: &str, free_limit: u64) -> bool {
    records.is_entitled(owner) || records.usage(owner) < free_limit
}
