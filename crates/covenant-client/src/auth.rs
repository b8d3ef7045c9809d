//! Credentials attached to outgoing calls.
//!
//! Bearer calls ask a [`TokenProvider`] for a token on every invocation.
//! Server-to-server calls hand the SHA-256 digest of the canonical signing
//! payload to a [`RequestSigner`] and send the result in `x-ba-signature`.

use crate::{ClientError, ClientResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use std::fmt;

/// Supplies bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns the current token, or `None` to send the call unauthenticated.
    async fn token(&self) -> Option<String>;
}

/// A token that never changes.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wraps `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Signs server-to-server calls.
#[async_trait]
pub trait RequestSigner: Send + Sync {
    /// Signs the payload digest and returns the header value.
    async fn sign(&self, digest: &[u8; 32]) -> ClientResult<String>;
}

/// Ed25519 signer producing base64 signatures.
///
/// # Example
///
/// ```
/// use covenant_client::Ed25519Signer;
///
/// let signer = Ed25519Signer::from_bytes(&[7u8; 32]);
/// let public = signer.verifying_key();
/// assert_eq!(public.as_bytes().len(), 32);
/// ```
#[derive(Clone)]
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    /// Creates a signer from a 32-byte secret key.
    #[must_use]
    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(secret),
        }
    }

    /// Creates a signer from a base64-encoded 32-byte secret key.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the value is not valid
    /// base64 or not 32 bytes long.
    pub fn from_base64(secret: &str) -> ClientResult<Self> {
        let bytes = STANDARD
            .decode(secret.trim())
            .map_err(|e| ClientError::configuration(format!("invalid signing key: {e}")))?;
        let secret: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            ClientError::configuration(format!(
                "signing key must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::from_bytes(&secret))
    }

    /// Returns the public half, for registering with the receiving server.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("verifying_key", &self.verifying_key())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RequestSigner for Ed25519Signer {
    async fn sign(&self, digest: &[u8; 32]) -> ClientResult<String> {
        Ok(STANDARD.encode(self.key.sign(digest).to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Signature;

    #[tokio::test]
    async fn test_signature_verifies_with_public_key() {
        let signer = Ed25519Signer::from_bytes(&[3u8; 32]);
        let digest = [9u8; 32];

        let encoded = signer.sign(&digest).await.unwrap();
        let bytes: [u8; 64] = STANDARD.decode(encoded).unwrap().try_into().unwrap();
        let signature = Signature::from_bytes(&bytes);

        assert!(signer
            .verifying_key()
            .verify_strict(&digest, &signature)
            .is_ok());
        assert!(signer
            .verifying_key()
            .verify_strict(&[0u8; 32], &signature)
            .is_err());
    }

    #[test]
    fn test_from_base64() {
        let encoded = STANDARD.encode([1u8; 32]);
        let signer = Ed25519Signer::from_base64(&encoded).unwrap();
        assert_eq!(
            signer.verifying_key(),
            Ed25519Signer::from_bytes(&[1u8; 32]).verifying_key()
        );

        assert!(matches!(
            Ed25519Signer::from_base64(&STANDARD.encode([1u8; 16])),
            Err(ClientError::Configuration(_))
        ));
        assert!(Ed25519Signer::from_base64("not base64!").is_err());
    }

    #[tokio::test]
    async fn test_static_token_is_redacted() {
        let token = StaticToken::new("secret");
        assert_eq!(token.token().await.as_deref(), Some("secret"));
        assert_eq!(format!("{token:?}"), "StaticToken(***)");
    }
}
