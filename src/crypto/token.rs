use std::fmt;
use std::str::FromStr;

use hmac::Mac;

use serde::{Deserialize, Serialize};

use chrono::{DateTime, Duration, TimeZone, Utc};

use base64::{
    alphabet,
    engine::{self, general_purpose},
    Engine as _,
};

lazy_static::lazy_static! {
    // Base64 deserialization engine
    static ref BASE64_ENGINE: engine::GeneralPurpose =
        engine::GeneralPurpose::new(&alphabet::URL_SAFE, general_purpose::NO_PAD);
}

/// Various errors that can occur when handling tokens
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token signature does not match")]
    SignatureMismatch,
    #[error("Token is expired")]
    Expired,
    #[error("Token was issued for \"{0}\"")]
    WrongPurpose(String),
    #[error("Failed to decode or encode token")]
    DecodeEncodeError,
}

impl From<std::str::Utf8Error> for TokenError {
    fn from(_e: std::str::Utf8Error) -> Self {
        Self::DecodeEncodeError
    }
}

impl From<serde_json::Error> for TokenError {
    fn from(_e: serde_json::Error) -> Self {
        Self::DecodeEncodeError
    }
}

impl From<base64::DecodeError> for TokenError {
    fn from(_e: base64::DecodeError) -> Self {
        Self::DecodeEncodeError
    }
}

/// Wrapper for token results
pub type TokenResult<T> = Result<T, TokenError>;

/// A serialized, cryptographically-signed token.
///
/// The token is `<message>.<signature>`, both halves url-safe base64. The
/// message is a JSON object carrying a purpose string, an optional expiry and
/// the payload. The purpose keeps a token minted for one flow from being
/// accepted by another.
#[derive(Debug, Clone, PartialEq)]
pub struct Token(String);

impl Token {
    /// Initialize a token builder to construct a token
    pub fn builder<T: Serialize>(purpose: &str, payload: T) -> TokenBuilder<T> {
        TokenBuilder::new(purpose, payload)
    }

    /// Verify the token and deconstruct into the encoded payload value
    pub fn verify<T, K>(&self, purpose: &str, key: &K) -> TokenResult<T>
    where
        T: for<'de> Deserialize<'de>,
        K: Mac + Clone,
    {
        let (msg, sig) = self.split().ok_or(TokenError::DecodeEncodeError)?;

        let msg = BASE64_ENGINE.decode(msg)?;
        let sig = BASE64_ENGINE.decode(sig)?;

        TokenMessage::verify_from_bytes(key, purpose, &msg, &sig)
    }

    fn split(&self) -> Option<(&str, &str)> {
        let (msg, sig) = self.0.split_once('.')?;
        if msg.is_empty() || sig.is_empty() {
            return None;
        }
        Some((msg, sig))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Token {
    type Err = TokenError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        if token.split_once('.').is_none() {
            return Err(TokenError::DecodeEncodeError);
        }
        Ok(Self(token.to_string()))
    }
}

/// Handy builder for creating and signing Tokens
#[derive(Debug)]
pub struct TokenBuilder<T> {
    purpose: String,
    expiration: Option<DateTime<Utc>>,
    payload: T,
}

impl<T: Serialize> TokenBuilder<T> {
    /// Create a new token builder with the specified payload
    pub fn new(purpose: &str, payload: T) -> Self {
        Self {
            purpose: purpose.to_string(),
            expiration: None,
            payload,
        }
    }
    /// Set the token to expire after a specified duration
    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.expiration = Some(Utc::now() + duration);
        self
    }
    /// Set the token to expire at a specified date-time
    pub fn expires_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.expiration = Some(timestamp);
        self
    }
    /// Sign the token with the specified key
    pub fn sign<K>(self, key: &K) -> TokenResult<Token>
    where
        K: Mac + Clone,
    {
        let msg = self.serialize_message()?;
        let sig = sign_message(key, msg.as_bytes());

        let msg = BASE64_ENGINE.encode(msg);
        let sig = BASE64_ENGINE.encode(sig);

        Ok(Token(format!("{}.{}", msg, sig)))
    }

    fn serialize_message(self) -> serde_json::Result<String> {
        let msg: TokenMessage<T> = self.into();
        serde_json::to_string(&msg)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenMessage<T> {
    purpose: String,
    exp: Option<i64>,
    data: T,
}

impl<T: for<'de> Deserialize<'de>> TokenMessage<T> {
    fn verify_from_bytes<K>(key: &K, purpose: &str, msg: &[u8], signature: &[u8]) -> TokenResult<T>
    where
        K: Mac + Clone,
    {
        // Nothing is deserialized before the signature checks out
        verify_message(key, msg, signature)?;

        let msg = std::str::from_utf8(msg)?;
        let msg: TokenMessage<T> = serde_json::from_str(msg)?;

        if msg.purpose != purpose {
            return Err(TokenError::WrongPurpose(msg.purpose));
        }
        if msg.is_expired() {
            return Err(TokenError::Expired);
        }
        Ok(msg.data)
    }

    fn is_expired(&self) -> bool {
        match self.exp {
            None => false,
            // An unrepresentable timestamp counts as expired
            Some(exp) => Utc
                .timestamp_opt(exp, 0u32)
                .earliest()
                .map(|exp| Utc::now() >= exp)
                .unwrap_or(true),
        }
    }
}

impl<T> From<TokenBuilder<T>> for TokenMessage<T> {
    fn from(value: TokenBuilder<T>) -> Self {
        Self {
            purpose: value.purpose,
            exp: value.expiration.map(|date| date.timestamp()),
            data: value.payload,
        }
    }
}

fn sign_message<K>(key: &K, msg: &[u8]) -> Vec<u8>
where
    K: Mac + Clone,
{
    key.clone().chain_update(msg).finalize().into_bytes().to_vec()
}

fn verify_message<K>(key: &K, msg: &[u8], signature: &[u8]) -> TokenResult<()>
where
    K: Mac + Clone,
{
    key.clone()
        .chain_update(msg)
        .verify_slice(signature)
        .map_err(|_| TokenError::SignatureMismatch)
}
