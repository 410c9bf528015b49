//! Session store: one row per issued session, revocation as an atomic
//! conditional update.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AuthError;
use crate::models::session::Session;
use crate::types::SessionId;

/// Persistence seam for session records.
///
/// The `revoke` contract is what makes refresh-secret replay detectable:
/// flipping `revoked` succeeds at most once per session, so concurrent
/// rotations race on the update and exactly one wins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts a new session row.
    async fn create(&self, session: Session) -> Result<(), AuthError>;

    /// Returns the row only while `revoked = false`. Absent and revoked
    /// sessions are deliberately indistinguishable to callers.
    async fn get_active(&self, session_id: SessionId) -> Result<Session, AuthError>;

    /// Atomically flips `revoked` to true if currently false. `NotFound`
    /// when zero rows changed (already revoked or never existed).
    async fn revoke(&self, session_id: SessionId) -> Result<(), AuthError>;
}

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: Session) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO sessions
                (session_id, user_id, refresh_secret_hash, origin_fingerprint, origin_network, created_at, revoked)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(session.session_id)
        .bind(session.user_id)
        .bind(&session.refresh_secret_hash)
        .bind(&session.origin_fingerprint)
        .bind(&session.origin_network)
        .bind(session.created_at)
        .bind(session.revoked)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_active(&self, session_id: SessionId) -> Result<Session, AuthError> {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT session_id, user_id, refresh_secret_hash, origin_fingerprint, origin_network, created_at, revoked
            FROM sessions
            WHERE session_id = $1 AND revoked = FALSE
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AuthError::NotFound("No active session found".to_string()))
    }

    async fn revoke(&self, session_id: SessionId) -> Result<(), AuthError> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked = TRUE WHERE session_id = $1 AND revoked = FALSE",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("No active session found".to_string()));
        }
        Ok(())
    }
}
