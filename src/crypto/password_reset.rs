use chrono::Duration;

use serde::{Deserialize, Serialize};

use super::{SigningKey, Token, TokenResult};

const PURPOSE: &str = "password-reset";

/// Claim that the holder may choose a new password for `email`. Also used for
/// the first password of accounts created by an administrator.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct PasswordReset {
    pub email: String,
}

impl PasswordReset {
    pub fn lifetime() -> Duration {
        Duration::hours(1)
    }

    pub fn sign(&self, key: &SigningKey) -> TokenResult<Token> {
        Token::builder(PURPOSE, self)
            .expires_in(Self::lifetime())
            .sign(key.as_ref())
    }

    pub fn verify(key: &SigningKey, token: &str) -> TokenResult<Self> {
        token.parse::<Token>()?.verify(PURPOSE, key.as_ref())
    }
}
