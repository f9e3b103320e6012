//! Distributed per-item lock port.
//!
//! The lock serializes sync runs per item cluster-wide: set-if-absent with a
//! random fencing token and a TTL. Acquisition does not retry; a held lock
//! surfaces `LockBusy` and the caller drops the job. The returned guard is a
//! one-shot release capability that deletes the key only while the stored
//! token still matches, so a lock that expired and was re-acquired elsewhere
//! is never released by the original holder.

mod memory;
mod redis;

pub use memory::{MemoryLockGuard, MemorySyncLock};
pub use redis::{RedisLockGuard, RedisSyncLock};

use std::future::Future;
use std::time::Duration;

use crate::error::RelayResult;

/// Prefix for per-item sync lock keys.
pub const LOCK_KEY_PREFIX: &str = "sync:lock:";

/// Default lock TTL; the fencing horizon for a single sync run.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(120);

/// Builds the lock key for an item.
pub fn lock_key(item_id: impl std::fmt::Display) -> String {
    format!("{LOCK_KEY_PREFIX}{item_id}")
}

/// Trait for acquiring the per-item mutual exclusion lock.
pub trait SyncLock {
    type Guard: LockGuard + Send;

    /// Attempts to take the lock, returning `LockBusy` when already held.
    fn acquire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = RelayResult<Self::Guard>> + Send;
}

/// One-shot release capability returned by [`SyncLock::acquire`].
///
/// The fencing token is owned by the guard and never exposed to callers.
pub trait LockGuard {
    /// Releases the lock via compare-and-delete.
    ///
    /// A no-op when the key has expired or been re-acquired by another
    /// holder in the meantime.
    fn release(self) -> impl Future<Output = RelayResult<()>> + Send;
}
