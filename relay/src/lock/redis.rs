use fred::prelude::{KeysInterface, LuaInterface, Pool};
use fred::types::{Expiration, SetOptions};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{ErrorKind, RelayError, RelayResult};
use crate::lock::{LockGuard, SyncLock};

/// Compare-and-delete script: the key is removed only while it still holds
/// this guard's fencing token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Upper bound on the release round-trip, detached from job cancellation so
/// shutdown does not orphan lock keys.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis-backed per-item lock.
///
/// `SET key token PX ttl NX` with a uuid fencing token. The TTL bounds the
/// damage of a crashed holder: once it elapses another worker may take the
/// item, and the compare-and-delete release keeps the stale guard from
/// clobbering the new holder's key.
#[derive(Clone)]
pub struct RedisSyncLock {
    client: Pool,
}

impl RedisSyncLock {
    pub fn new(client: Pool) -> Self {
        Self { client }
    }
}

impl SyncLock for RedisSyncLock {
    type Guard = RedisLockGuard;

    async fn acquire(&self, key: &str, ttl: Duration) -> RelayResult<Self::Guard> {
        let token = Uuid::new_v4().to_string();

        let acquired: Option<String> = self
            .client
            .set(
                key,
                token.as_str(),
                Some(Expiration::PX(ttl.as_millis() as i64)),
                Some(SetOptions::NX),
                false,
            )
            .await
            .map_err(|err| RelayError::with_source(ErrorKind::LockTransport, err))?;

        if acquired.is_none() {
            return Err(RelayError::lock_busy(key));
        }

        Ok(RedisLockGuard {
            client: self.client.clone(),
            key: key.to_string(),
            token,
        })
    }
}

/// Release capability for a held Redis lock.
pub struct RedisLockGuard {
    client: Pool,
    key: String,
    token: String,
}

impl LockGuard for RedisLockGuard {
    async fn release(self) -> RelayResult<()> {
        let release = self
            .client
            .eval::<i64, _, _, _>(RELEASE_SCRIPT, vec![self.key], vec![self.token]);

        tokio::time::timeout(RELEASE_TIMEOUT, release)
            .await
            .map_err(|err| RelayError::with_source(ErrorKind::LockTransport, err))?
            .map_err(|err| RelayError::with_source(ErrorKind::LockTransport, err))?;

        Ok(())
    }
}
