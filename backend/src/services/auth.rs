//! Session lifecycle protocol: issuance, rotation and revocation of access
//! credential / refresh secret pairs.

use std::sync::Arc;

use crate::config::Config;
use crate::error::AuthError;
use crate::models::session::Session;
use crate::repositories::session::SessionStore;
use crate::services::denylist::Denylist;
use crate::services::notifier::AnomalyNotifier;
use crate::types::{SessionId, UserId};
use crate::utils::{jwt, refresh};

/// Credential pair handed to a client. The refresh secret exists in plaintext
/// only here and in transit; the store keeps its hash.
#[derive(Debug)]
pub struct SessionTokens {
    pub session_id: SessionId,
    pub access_token: String,
    pub refresh_secret: String,
}

/// Orchestrates the credential codec, secret hasher, session store, denylist
/// and anomaly notifier.
///
/// Holds no mutable in-process state; the only mutual exclusion in the whole
/// protocol is the store's atomic "revoke succeeds at most once" update, so
/// the service is safe under unbounded concurrent invocations.
pub struct AuthService {
    store: Arc<dyn SessionStore>,
    denylist: Arc<dyn Denylist>,
    notifier: Arc<dyn AnomalyNotifier>,
    signing_secret: String,
    access_token_ttl_minutes: u64,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        denylist: Arc<dyn Denylist>,
        notifier: Arc<dyn AnomalyNotifier>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            denylist,
            notifier,
            signing_secret: config.signing_secret.clone(),
            access_token_ttl_minutes: config.access_token_ttl_minutes,
        }
    }

    /// Issues a fresh session: new session ID, signed access credential and
    /// single-use refresh secret, persisted as one active row.
    ///
    /// If persistence fails no usable credential reaches the caller.
    pub async fn new_session(
        &self,
        user_id: UserId,
        origin_fingerprint: &str,
        origin_network: &str,
    ) -> Result<SessionTokens, AuthError> {
        let session_id = SessionId::new();

        let access_token = jwt::create_access_token(
            user_id,
            session_id,
            &self.signing_secret,
            self.access_token_ttl_minutes,
        )?;

        let (refresh_secret, refresh_secret_hash) = refresh::generate_refresh_secret()?;

        let session = Session::new(
            session_id,
            user_id,
            refresh_secret_hash,
            origin_fingerprint,
            origin_network,
        );
        self.store.create(session).await?;

        tracing::debug!(%session_id, %user_id, "Session issued");

        Ok(SessionTokens {
            session_id,
            access_token,
            refresh_secret,
        })
    }

    /// Exchanges a credential pair for a brand-new one, revoking the old
    /// session. Refresh secrets form a single-use chain: every successful
    /// call consumes the presented pair entirely.
    ///
    /// Expiry of the access credential is deliberately not enforced here; a
    /// session may be refreshed slightly past nominal expiry as long as the
    /// refresh secret still verifies.
    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_secret: &str,
        origin_fingerprint: &str,
        origin_network: &str,
    ) -> Result<SessionTokens, AuthError> {
        let claims = jwt::decode_for_lifecycle(access_token, &self.signing_secret)?;
        let session_id = claims.session_id()?;
        let user_id = claims.user_id()?;

        let session = match self.store.get_active(session_id).await {
            Ok(session) => session,
            Err(AuthError::NotFound(_)) => {
                return Err(AuthError::Authentication(
                    "Unknown or revoked session".to_string(),
                ))
            }
            Err(e) => return Err(e),
        };

        // A different device presenting an otherwise valid pair is treated
        // as credential theft: the session dies and the still-valid access
        // credential goes on the denylist. State changes even though the
        // call fails.
        if session.origin_fingerprint != origin_fingerprint {
            match self.revoke_session(access_token).await {
                Ok(()) | Err(AuthError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
            tracing::warn!(%session_id, "Origin fingerprint mismatch on refresh, session revoked");
            return Err(AuthError::Authentication(
                "Origin fingerprint mismatch".to_string(),
            ));
        }

        // Network origins legitimately change (mobile roaming); report the
        // anomaly downstream and keep going. Never awaited.
        if session.origin_network != origin_network {
            self.notifier
                .notify(session_id, &session.origin_network, origin_network);
        }

        // A wrong secret with a correct fingerprint is most plausibly client
        // error, not compromise: reject without revoking.
        if !refresh::verify_refresh_secret(refresh_secret, &session.refresh_secret_hash)? {
            return Err(AuthError::Authentication(
                "Invalid refresh secret".to_string(),
            ));
        }

        // At-most-once use: concurrent rotations on the same pair race on
        // this conditional update and exactly one wins.
        match self.store.revoke(session_id).await {
            Ok(()) => {}
            Err(AuthError::NotFound(_)) => {
                // The secret verified but the session was already consumed:
                // two parties presented the same refresh secret. Logged as
                // its own signal for security monitoring; on the wire it is
                // an ordinary authentication failure.
                tracing::warn!(
                    %session_id,
                    %user_id,
                    "Refresh secret replay detected on already-consumed session"
                );
                return Err(AuthError::Authentication(
                    "Refresh secret already used".to_string(),
                ));
            }
            Err(e) => return Err(e),
        }

        self.new_session(user_id, origin_fingerprint, origin_network)
            .await
    }

    /// Terminates a session and denies its access credential for whatever
    /// validity it has left.
    ///
    /// Authority to revoke is carried entirely by the credential's
    /// signature; the refresh secret is accepted but not re-verified.
    /// Revoking an unknown or already-revoked session is an error, not a
    /// no-op, since silent success would hide client bugs.
    pub async fn revoke(&self, access_token: &str, _refresh_secret: &str) -> Result<(), AuthError> {
        self.revoke_session(access_token).await
    }

    async fn revoke_session(&self, access_token: &str) -> Result<(), AuthError> {
        let claims = jwt::decode_for_lifecycle(access_token, &self.signing_secret)?;
        let session_id = claims.session_id()?;

        self.store.revoke(session_id).await?;

        match jwt::remaining_validity(access_token, &self.signing_secret) {
            Ok(ttl) => self.denylist.add(session_id, ttl).await?,
            // Already past expiry: nothing left to deny.
            Err(AuthError::ExpiredCredential) => {}
            Err(e) => return Err(e),
        }

        tracing::debug!(%session_id, "Session revoked");
        Ok(())
    }

    /// Gate check for authenticated requests: full credential verification
    /// (expiry enforced) plus denylist membership. Denylist unavailability
    /// fails the check (closed, not open).
    pub async fn check_authenticated(&self, access_token: &str) -> Result<UserId, AuthError> {
        let claims = jwt::verify_access_token(access_token, &self.signing_secret)?;
        let session_id = claims.session_id()?;

        if self.denylist.is_denied(session_id).await? {
            return Err(AuthError::Authentication(
                "Session has been revoked".to_string(),
            ));
        }

        claims.user_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::session::MockSessionStore;
    use crate::services::denylist::MockDenylist;
    use crate::services::notifier::MockAnomalyNotifier;
    use crate::utils::cookies::SameSite;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use std::sync::Mutex;

    const SECRET: &str = "test-signing-secret";

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/test".into(),
            database_pool_size: 1,
            database_connect_timeout: 1,
            redis_url: "redis://localhost".into(),
            redis_pool_size: 1,
            redis_connect_timeout: 1,
            signing_secret: SECRET.into(),
            access_token_ttl_minutes: 30,
            refresh_cookie_ttl_days: 7,
            webhook_url: None,
            cookie_secure: false,
            cookie_same_site: SameSite::Strict,
            port: 0,
        }
    }

    fn service(
        store: MockSessionStore,
        denylist: MockDenylist,
        notifier: MockAnomalyNotifier,
    ) -> AuthService {
        AuthService::new(
            Arc::new(store),
            Arc::new(denylist),
            Arc::new(notifier),
            &test_config(),
        )
    }

    fn stored_session(user_id: UserId, refresh_secret_hash: String) -> Session {
        Session::new(
            SessionId::new(),
            user_id,
            refresh_secret_hash,
            "deviceA",
            "1.2.3.4",
        )
    }

    fn expired_token(user_id: UserId, session_id: SessionId) -> String {
        let claims = jwt::Claims {
            sub: user_id.to_string(),
            sid: session_id.to_string(),
            exp: chrono::Utc::now().timestamp() - 7200,
            iat: chrono::Utc::now().timestamp() - 9000,
        };
        encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_ref()),
        )
        .expect("encode token")
    }

    #[tokio::test]
    async fn new_session_persists_row_and_returns_matching_pair() {
        let captured: Arc<Mutex<Option<Session>>> = Arc::new(Mutex::new(None));
        let captured_in = captured.clone();

        let mut store = MockSessionStore::new();
        store.expect_create().times(1).returning(move |session| {
            *captured_in.lock().unwrap() = Some(session);
            Ok(())
        });

        let svc = service(store, MockDenylist::new(), MockAnomalyNotifier::new());
        let user_id = UserId::new();
        let tokens = svc
            .new_session(user_id, "deviceA", "1.2.3.4")
            .await
            .expect("issue session");

        let claims = jwt::verify_access_token(&tokens.access_token, SECRET).expect("verify");
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.session_id().unwrap(), tokens.session_id);

        let row = captured.lock().unwrap().take().expect("row persisted");
        assert_eq!(row.session_id, tokens.session_id);
        assert_eq!(row.user_id, user_id);
        assert!(!row.revoked);
        assert_eq!(row.origin_fingerprint, "deviceA");
        assert_eq!(row.origin_network, "1.2.3.4");
        assert!(refresh::verify_refresh_secret(&tokens.refresh_secret, &row.refresh_secret_hash)
            .unwrap());
    }

    #[tokio::test]
    async fn refresh_of_unknown_or_revoked_session_is_an_authentication_error() {
        let mut store = MockSessionStore::new();
        store
            .expect_get_active()
            .times(1)
            .returning(|_| Err(AuthError::NotFound("No active session found".into())));

        let svc = service(store, MockDenylist::new(), MockAnomalyNotifier::new());
        let user_id = UserId::new();
        let token =
            jwt::create_access_token(user_id, SessionId::new(), SECRET, 30).expect("token");

        let result = svc.refresh(&token, "whatever", "deviceA", "1.2.3.4").await;
        assert!(matches!(result, Err(AuthError::Authentication(_))));
    }

    #[tokio::test]
    async fn refresh_fingerprint_mismatch_revokes_and_denylists() {
        let user_id = UserId::new();
        let (secret, hash) = refresh::generate_refresh_secret().unwrap();
        let session = stored_session(user_id, hash);
        let session_id = session.session_id;
        let token = jwt::create_access_token(user_id, session_id, SECRET, 30).expect("token");

        let mut store = MockSessionStore::new();
        let returned = session.clone();
        store
            .expect_get_active()
            .times(1)
            .returning(move |_| Ok(returned.clone()));
        store
            .expect_revoke()
            .withf(move |sid| *sid == session_id)
            .times(1)
            .returning(|_| Ok(()));

        let mut denylist = MockDenylist::new();
        denylist
            .expect_add()
            .withf(move |sid, ttl| {
                // TTL must track the credential's remaining validity.
                *sid == session_id && ttl.as_secs() > 29 * 60 && ttl.as_secs() <= 30 * 60
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let svc = service(store, denylist, MockAnomalyNotifier::new());
        let result = svc.refresh(&token, &secret, "deviceB", "1.2.3.4").await;
        assert!(matches!(result, Err(AuthError::Authentication(_))));
    }

    #[tokio::test]
    async fn refresh_with_wrong_secret_fails_without_revoking() {
        let user_id = UserId::new();
        let (_, hash) = refresh::generate_refresh_secret().unwrap();
        let session = stored_session(user_id, hash);
        let token =
            jwt::create_access_token(user_id, session.session_id, SECRET, 30).expect("token");

        let mut store = MockSessionStore::new();
        let returned = session.clone();
        store
            .expect_get_active()
            .times(1)
            .returning(move |_| Ok(returned.clone()));
        // No revoke expectation: a call would fail the test.

        let svc = service(store, MockDenylist::new(), MockAnomalyNotifier::new());
        let (other_secret, _) = refresh::generate_refresh_secret().unwrap();
        let result = svc
            .refresh(&token, &other_secret, "deviceA", "1.2.3.4")
            .await;
        assert!(matches!(result, Err(AuthError::Authentication(_))));
    }

    #[tokio::test]
    async fn refresh_network_change_notifies_and_still_rotates() {
        let user_id = UserId::new();
        let (secret, hash) = refresh::generate_refresh_secret().unwrap();
        let session = stored_session(user_id, hash);
        let session_id = session.session_id;
        let token = jwt::create_access_token(user_id, session_id, SECRET, 30).expect("token");

        let mut store = MockSessionStore::new();
        let returned = session.clone();
        store
            .expect_get_active()
            .times(1)
            .returning(move |_| Ok(returned.clone()));
        store.expect_revoke().times(1).returning(|_| Ok(()));
        store.expect_create().times(1).returning(|_| Ok(()));

        let mut notifier = MockAnomalyNotifier::new();
        notifier
            .expect_notify()
            .withf(move |sid, old, new| *sid == session_id && old == "1.2.3.4" && new == "5.6.7.8")
            .times(1)
            .return_const(());

        let svc = service(store, MockDenylist::new(), notifier);
        let tokens = svc
            .refresh(&token, &secret, "deviceA", "5.6.7.8")
            .await
            .expect("rotation succeeds despite network change");
        assert_ne!(tokens.session_id, session_id);
    }

    #[tokio::test]
    async fn refresh_replay_of_consumed_secret_is_rejected_without_new_credentials() {
        let user_id = UserId::new();
        let (secret, hash) = refresh::generate_refresh_secret().unwrap();
        let session = stored_session(user_id, hash);
        let token =
            jwt::create_access_token(user_id, session.session_id, SECRET, 30).expect("token");

        let mut store = MockSessionStore::new();
        let returned = session.clone();
        store
            .expect_get_active()
            .times(1)
            .returning(move |_| Ok(returned.clone()));
        // Another rotation got there first; no new session may be created.
        store
            .expect_revoke()
            .times(1)
            .returning(|_| Err(AuthError::NotFound("No active session found".into())));

        let svc = service(store, MockDenylist::new(), MockAnomalyNotifier::new());
        let result = svc.refresh(&token, &secret, "deviceA", "1.2.3.4").await;
        assert!(matches!(result, Err(AuthError::Authentication(_))));
    }

    #[tokio::test]
    async fn revoke_of_expired_credential_skips_the_denylist() {
        let user_id = UserId::new();
        let session_id = SessionId::new();
        let token = expired_token(user_id, session_id);

        let mut store = MockSessionStore::new();
        store
            .expect_revoke()
            .withf(move |sid| *sid == session_id)
            .times(1)
            .returning(|_| Ok(()));
        // No denylist expectation: nothing left to deny.

        let svc = service(store, MockDenylist::new(), MockAnomalyNotifier::new());
        svc.revoke(&token, "refresh-secret").await.expect("revoke");
    }

    #[tokio::test]
    async fn revoke_of_unknown_session_surfaces_not_found() {
        let mut store = MockSessionStore::new();
        store
            .expect_revoke()
            .times(1)
            .returning(|_| Err(AuthError::NotFound("No active session found".into())));

        let svc = service(store, MockDenylist::new(), MockAnomalyNotifier::new());
        let token =
            jwt::create_access_token(UserId::new(), SessionId::new(), SECRET, 30).expect("token");
        let result = svc.revoke(&token, "refresh-secret").await;
        assert!(matches!(result, Err(AuthError::NotFound(_))));
    }

    #[tokio::test]
    async fn check_authenticated_fails_closed_when_denylist_is_down() {
        let mut denylist = MockDenylist::new();
        denylist
            .expect_is_denied()
            .times(1)
            .returning(|_| Err(AuthError::Persistence(anyhow::anyhow!("redis down"))));

        let svc = service(MockSessionStore::new(), denylist, MockAnomalyNotifier::new());
        let token =
            jwt::create_access_token(UserId::new(), SessionId::new(), SECRET, 30).expect("token");
        let result = svc.check_authenticated(&token).await;
        assert!(matches!(result, Err(AuthError::Persistence(_))));
    }

    #[tokio::test]
    async fn check_authenticated_rejects_denylisted_session() {
        let mut denylist = MockDenylist::new();
        denylist.expect_is_denied().times(1).returning(|_| Ok(true));

        let svc = service(MockSessionStore::new(), denylist, MockAnomalyNotifier::new());
        let token =
            jwt::create_access_token(UserId::new(), SessionId::new(), SECRET, 30).expect("token");
        let result = svc.check_authenticated(&token).await;
        assert!(matches!(result, Err(AuthError::Authentication(_))));
    }

    #[tokio::test]
    async fn check_authenticated_returns_user_for_clean_session() {
        let mut denylist = MockDenylist::new();
        denylist
            .expect_is_denied()
            .times(1)
            .returning(|_| Ok(false));

        let svc = service(MockSessionStore::new(), denylist, MockAnomalyNotifier::new());
        let user_id = UserId::new();
        let token =
            jwt::create_access_token(user_id, SessionId::new(), SECRET, 30).expect("token");
        assert_eq!(svc.check_authenticated(&token).await.unwrap(), user_id);
    }
}
