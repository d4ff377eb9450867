//! Password hashing and registration validation.
use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

use crate::db::model::{MAX_EMAIL_LEN, MAX_USERNAME_LEN};

/// Derive a salted argon2 hash (PHC string) from a plaintext password.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored hash. Returns false on
/// mismatch or when the stored hash cannot be parsed, never an error.
pub fn verify_password(password_hash: &str, password: &str) -> bool {
    let hash = match PasswordHash::new(password_hash) {
        Ok(hash) => hash,
        Err(err) => {
            tracing::error!("failed to parse password hash: {}", err);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok()
}

/// Validate a username for registration.
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    if username.is_empty() {
        return Err("username must be non-empty");
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err("username must be at most 64 characters long");
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err("username must only contain alphanumeric characters and underscores");
    }
    Ok(())
}

/// Validate an email for registration.
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.len() > MAX_EMAIL_LEN {
        return Err("email must be at most 120 characters long");
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err("email must contain an @");
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err("email is not a valid address");
    }
    Ok(())
}
