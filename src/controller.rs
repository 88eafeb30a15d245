use anyhow::Context;

use secrecy::{ExposeSecret, Secret};

use crate::crypto::password;
use crate::error::{RestError, RestResult};
use crate::telemetry::spawn_blocking_with_tracing;

pub mod account;
pub mod admin;
pub mod blog;
pub mod password_reset;
pub mod users;

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

/// Map a unique-constraint violation to 409, anything else to a database error
fn conflict_on_duplicate(message: &'static str) -> impl FnOnce(sqlx::Error) -> RestError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => RestError::Conflict(message.into()),
        _ => e.into(),
    }
}

/// At least one upper-case letter, lower-case letter, digit and symbol
fn check_password_strength(password: &Secret<String>) -> RestResult<()> {
    let password = password.expose_secret();
    let length = password.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
        return Err(RestError::ParseError(format!(
            "password must be between {} and {} characters",
            MIN_PASSWORD_LENGTH, MAX_PASSWORD_LENGTH
        )));
    }

    let strong = password.chars().any(char::is_uppercase)
        && password.chars().any(char::is_lowercase)
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace());
    if strong {
        Ok(())
    } else {
        Err(RestError::ParseError(
            "password needs upper and lower case letters, a digit and a symbol".into(),
        ))
    }
}

async fn hash_password(password: Secret<String>) -> RestResult<Secret<String>> {
    let password_hash = spawn_blocking_with_tracing(move || password::hash(password))
        .await
        .context("Failed to spawn blocking task")??;
    Ok(password_hash)
}
