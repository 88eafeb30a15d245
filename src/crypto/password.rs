//! Argon2 password hashing. Both functions are CPU bound and should be run
//! through [`crate::telemetry::spawn_blocking_with_tracing`] from async code.

use anyhow::Context;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use secrecy::{ExposeSecret, Secret};

#[tracing::instrument("Hash password", skip(password))]
pub fn hash(password: Secret<String>) -> anyhow::Result<Secret<String>> {
    let salt = SaltString::generate(&mut rand::thread_rng());

    let password_hash = Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(Secret::new(password_hash))
}

#[tracing::instrument("Verify password hash", skip(password, password_hash))]
pub fn verify(password: Secret<String>, password_hash: Secret<String>) -> anyhow::Result<()> {
    let password_hash = PasswordHash::new(password_hash.expose_secret())
        .map_err(|e| anyhow::anyhow!("Failed to parse stored password hash: {}", e))?;

    Argon2::default()
        .verify_password(password.expose_secret().as_bytes(), &password_hash)
        .context("Password does not match")
}

/// A random password nobody knows, for accounts whose owner still has to
/// pick one through a set-password link.
pub fn unusable() -> Secret<String> {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    let password: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect();
    Secret::new(password)
}
