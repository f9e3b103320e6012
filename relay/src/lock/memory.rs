use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{RelayError, RelayResult};
use crate::lock::{LockGuard, SyncLock};

#[derive(Debug)]
struct HeldLock {
    token: Uuid,
    expires_at: Instant,
}

/// In-memory lock for tests.
///
/// Mirrors the Redis semantics: set-if-absent with a token and TTL, busy
/// when held and unexpired, and compare-and-delete release.
#[derive(Debug, Clone, Default)]
pub struct MemorySyncLock {
    held: Arc<Mutex<HashMap<String, HeldLock>>>,
}

impl MemorySyncLock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncLock for MemorySyncLock {
    type Guard = MemoryLockGuard;

    async fn acquire(&self, key: &str, ttl: Duration) -> RelayResult<Self::Guard> {
        let mut held = self.held.lock().await;
        let now = Instant::now();

        if let Some(existing) = held.get(key) {
            if existing.expires_at > now {
                return Err(RelayError::lock_busy(key));
            }
        }

        let token = Uuid::new_v4();
        held.insert(
            key.to_string(),
            HeldLock {
                token,
                expires_at: now + ttl,
            },
        );

        Ok(MemoryLockGuard {
            held: self.held.clone(),
            key: key.to_string(),
            token,
        })
    }
}

/// Release capability for a held in-memory lock.
#[derive(Debug)]
pub struct MemoryLockGuard {
    held: Arc<Mutex<HashMap<String, HeldLock>>>,
    key: String,
    token: Uuid,
}

impl LockGuard for MemoryLockGuard {
    async fn release(self) -> RelayResult<()> {
        let mut held = self.held.lock().await;

        if held.get(&self.key).is_some_and(|lock| lock.token == self.token) {
            held.remove(&self.key);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_is_busy() {
        let lock = MemorySyncLock::new();
        let ttl = Duration::from_secs(60);

        let guard = lock.acquire("sync:lock:item", ttl).await.unwrap();

        let err = lock.acquire("sync:lock:item", ttl).await.unwrap_err();
        assert!(err.is_lock_busy());

        guard.release().await.unwrap();
        lock.acquire("sync:lock:item", ttl).await.unwrap();
    }

    #[tokio::test]
    async fn expired_lock_can_be_reacquired() {
        let lock = MemorySyncLock::new();

        let _stale = lock
            .acquire("sync:lock:item", Duration::from_millis(0))
            .await
            .unwrap();

        lock.acquire("sync:lock:item", Duration::from_secs(60))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn stale_guard_does_not_release_new_holder() {
        let lock = MemorySyncLock::new();

        let stale = lock
            .acquire("sync:lock:item", Duration::from_millis(0))
            .await
            .unwrap();
        let _current = lock
            .acquire("sync:lock:item", Duration::from_secs(60))
            .await
            .unwrap();

        // The stale guard's token no longer matches; release is a no-op.
        stale.release().await.unwrap();

        let err = lock
            .acquire("sync:lock:item", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(err.is_lock_busy());
    }
}
