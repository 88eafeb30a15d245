use actix_web::http::header::{self, HeaderMap};

use anyhow::Context;

use secrecy::Secret;

const BASIC_AUTH_PREFIX: &str = "Basic ";

/// Email and password sent with HTTP Basic authentication
#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: Secret<String>,
}

impl Credentials {
    /// Extract credentials from the headers of a request. `None` when the
    /// request carries no `Authorization` header at all (anonymous).
    pub fn from_headers(headers: &HeaderMap) -> anyhow::Result<Option<Self>> {
        let Some(header_value) = headers.get(header::AUTHORIZATION) else {
            return Ok(None);
        };
        let header_value = header_value
            .to_str()
            .context("Authorization header is not valid ASCII")?;

        if header_value.starts_with(BASIC_AUTH_PREFIX) {
            Self::from_basic(header_value).map(Some)
        } else {
            anyhow::bail!("Unknown Authorization scheme")
        }
    }

    /// Extract credentials from a string formatted as 'Basic <base64 credentials>'
    pub fn from_basic(header_value: &str) -> anyhow::Result<Self> {
        use base64::Engine;

        let header_value = header_value
            .strip_prefix(BASIC_AUTH_PREFIX)
            .context("Authorization scheme not basic")?;
        let decoded_value = base64::engine::general_purpose::STANDARD
            .decode(header_value)
            .context("Failed to decode authorization header")?;
        let decoded_value =
            String::from_utf8(decoded_value).context("Failed to decode authorization header")?;
        // The password may itself contain colons
        let (email, password) = decoded_value
            .split_once(':')
            .context("Missing password in authorization")?;

        Ok(Self {
            email: email.into(),
            password: Secret::new(password.into()),
        })
    }
}
