//! Model for server-side session records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{SessionId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Database representation of one logical login.
///
/// `revoked` is monotonic: once true it never transitions back, and rows are
/// never deleted; revoked sessions stay behind as an audit trail.
pub struct Session {
    /// Unique identifier for the session. Never reused.
    pub session_id: SessionId,
    /// Owning user.
    pub user_id: UserId,
    /// Salted one-way hash of the current refresh secret. The plaintext
    /// secret is never stored.
    pub refresh_secret_hash: String,
    /// Client device/browser identifier captured at issuance.
    pub origin_fingerprint: String,
    /// Client network origin captured at issuance.
    pub origin_network: String,
    /// Timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// Whether the session has been revoked. Terminal.
    pub revoked: bool,
}

impl Session {
    pub fn new(
        session_id: SessionId,
        user_id: UserId,
        refresh_secret_hash: String,
        origin_fingerprint: &str,
        origin_network: &str,
    ) -> Self {
        Self {
            session_id,
            user_id,
            refresh_secret_hash,
            origin_fingerprint: origin_fingerprint.to_string(),
            origin_network: origin_network.to_string(),
            created_at: Utc::now(),
            revoked: false,
        }
    }
}
