use hmac::{Hmac, Mac};

use sha2::Sha256;

use secrecy::Secret;

/// Application-wide HMAC key used to sign and verify tokens
#[derive(Clone)]
pub struct SigningKey(Hmac<Sha256>);

impl SigningKey {
    pub fn new(key: &Secret<String>) -> anyhow::Result<Self> {
        use secrecy::ExposeSecret;

        let key = key.expose_secret();
        if key.is_empty() {
            anyhow::bail!("Signing key cannot be empty");
        }
        let hmac = Hmac::new_from_slice(key.as_bytes())?;

        Ok(Self(hmac))
    }
}

impl AsRef<Hmac<Sha256>> for SigningKey {
    fn as_ref(&self) -> &Hmac<Sha256> {
        &self.0
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey([REDACTED])")
    }
}
