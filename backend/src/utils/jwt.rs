use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::types::{SessionId, UserId};

/// Algorithm family pinned for access credentials. Verification rejects any
/// token whose header claims a different algorithm, closing the classic
/// alg-substitution forgery vector.
const ACCESS_ALGORITHM: Algorithm = Algorithm::HS512;

/// Claims carried by an access credential. Decoded once into typed fields;
/// a token missing `sub` or `sid` fails verification outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub sid: String, // session_id
    pub exp: i64,    // expiration time
    pub iat: i64,    // issued at
}

impl Claims {
    pub fn new(user_id: UserId, session_id: SessionId, ttl_minutes: u64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::minutes(ttl_minutes as i64);

        Self {
            sub: user_id.to_string(),
            sid: session_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }

    pub fn user_id(&self) -> Result<UserId, AuthError> {
        self.sub
            .parse()
            .map_err(|_| AuthError::InvalidCredential("Invalid user ID in claims".to_string()))
    }

    pub fn session_id(&self) -> Result<SessionId, AuthError> {
        self.sid
            .parse()
            .map_err(|_| AuthError::InvalidCredential("Invalid session ID in claims".to_string()))
    }
}

pub fn create_access_token(
    user_id: UserId,
    session_id: SessionId,
    secret: &str,
    ttl_minutes: u64,
) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::Configuration(
            "signing secret is not configured".to_string(),
        ));
    }

    let claims = Claims::new(user_id, session_id, ttl_minutes);
    let token = encode(
        &Header::new(ACCESS_ALGORITHM),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| AuthError::InvalidCredential(format!("Failed to sign credential: {}", e)))?;

    Ok(token)
}

/// Full verification: signature, algorithm family, claim shape and expiry.
/// Used for authorization decisions.
pub fn verify_access_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    decode_with(token, secret, true)
}

/// Signature and claim-shape verification with expiry NOT enforced.
///
/// Rotation and revocation act on the session identity inside a credential,
/// which stays meaningful slightly past nominal expiry; authorization checks
/// must use [`verify_access_token`] instead.
pub fn decode_for_lifecycle(token: &str, secret: &str) -> Result<Claims, AuthError> {
    decode_with(token, secret, false)
}

/// Remaining validity of a credential, for bounding denylist entries.
/// Fails with `ExpiredCredential` once non-positive, when nothing is left to deny.
pub fn remaining_validity(token: &str, secret: &str) -> Result<std::time::Duration, AuthError> {
    let claims = decode_for_lifecycle(token, secret)?;

    let ttl = claims.exp - Utc::now().timestamp();
    if ttl <= 0 {
        return Err(AuthError::ExpiredCredential);
    }

    Ok(std::time::Duration::from_secs(ttl as u64))
}

fn decode_with(token: &str, secret: &str, validate_exp: bool) -> Result<Claims, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::Configuration(
            "signing secret is not configured".to_string(),
        ));
    }

    let mut validation = Validation::new(ACCESS_ALGORITHM);
    validation.validate_exp = validate_exp;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AuthError::InvalidCredential("Credential expired".to_string())
        }
        _ => AuthError::InvalidCredential(format!("Invalid credential: {}", e)),
    })?;

    Ok(token_data.claims)
}
