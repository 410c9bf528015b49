use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;

use crate::error::AuthError;

/// Entropy of a refresh secret in bytes (256 bits).
const SECRET_LEN: usize = 32;

/// Generates a refresh secret and the salted hash stored in its place.
///
/// The plaintext is returned exactly once and must never be persisted; only
/// the hash reaches the session row.
pub fn generate_refresh_secret() -> Result<(String, String), AuthError> {
    let mut bytes = [0u8; SECRET_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let secret = BASE64.encode(bytes);

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| {
            AuthError::Persistence(anyhow::anyhow!("Failed to hash refresh secret: {}", e))
        })?;

    Ok((secret, hash.to_string()))
}

/// Verifies a presented refresh secret against a stored hash.
///
/// A plain mismatch is `Ok(false)`; anything else (malformed hash, hasher
/// failure) is an error so it cannot be confused with a wrong secret.
pub fn verify_refresh_secret(secret: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| {
        AuthError::Persistence(anyhow::anyhow!("Invalid refresh secret hash: {}", e))
    })?;

    let argon2 = Argon2::default();
    let result = argon2.verify_password(secret.as_bytes(), &parsed_hash);

    match result {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Persistence(anyhow::anyhow!(
            "Refresh secret verification error: {}",
            e
        ))),
    }
}
