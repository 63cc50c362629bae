//! Argon2 password hashing.
//!
//! Hashing is CPU bound, so the async wrappers move the work onto the blocking pool.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::errors::ServiceError;

/// Hashes `password` into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

/// Returns `Ok(false)` for a wrong password and an error only if `hash` is not a
/// valid PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(hash).map_err(|e| ServiceError::HashError(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub async fn hash_password_blocking(password: String) -> Result<String, ServiceError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::InternalError(format!("hashing task failed: {}", e)))?
}

pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, ServiceError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ServiceError::InternalError(format!("verification task failed: {}", e)))?
}
