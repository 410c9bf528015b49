use crate::db::redis::RedisPool;
use crate::error::AuthError;
use crate::types::SessionId;
use async_trait::async_trait;
use bb8_redis::redis::AsyncCommands;
use std::time::Duration;

/// Denylist of invalidated session identifiers.
///
/// Entries carry exactly the remaining validity of the credential being
/// denied: longer would grow the store without bound, shorter would let a
/// revoked credential come back to life. Expired entries vanish on their own
/// via the store's TTL handling.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Denylist: Send + Sync {
    async fn add(&self, session_id: SessionId, ttl: Duration) -> Result<(), AuthError>;

    /// Existence check. Cache unavailability surfaces as an error: this is
    /// a fail-closed security check, never "not denied".
    async fn is_denied(&self, session_id: SessionId) -> Result<bool, AuthError>;
}

pub struct RedisDenylist {
    pool: RedisPool,
}

impl RedisDenylist {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    fn denylist_key(session_id: SessionId) -> String {
        format!("denylist:{}", session_id)
    }
}

#[async_trait]
impl Denylist for RedisDenylist {
    async fn add(&self, session_id: SessionId, ttl: Duration) -> Result<(), AuthError> {
        let span = tracing::debug_span!("redis_denylist_add", %session_id);
        let _enter = span.enter();

        let mut conn = self.pool.get().await?;
        let key = Self::denylist_key(session_id);
        conn.set_ex::<_, _, ()>(key, "revoked", ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn is_denied(&self, session_id: SessionId) -> Result<bool, AuthError> {
        let span = tracing::debug_span!("redis_denylist_check", %session_id);
        let _enter = span.enter();

        let mut conn = self.pool.get().await?;
        let key = Self::denylist_key(session_id);
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }
}
