//! Server-side authentication.
//!
//! Bearer tokens are surfaced as-is unless a [`TokenVerifier`] is installed.
//! Server-to-server contracts always require a valid signature from a
//! [`SignatureVerifier`].

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use covenant_core::{CovenantError, CovenantResult};
use ed25519_dalek::{Signature, VerifyingKey};
use std::collections::HashMap;
use std::fmt;

/// Checks bearer tokens.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Returns the token's subject, or an error (usually 401) to reject it.
    async fn verify(&self, token: &str) -> CovenantResult<String>;
}

/// Checks server-to-server signatures.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Returns `true` if `signature` is `app_id`'s signature over `digest`.
    async fn verify(&self, app_id: &str, digest: &[u8; 32], signature: &str) -> bool;
}

/// Verifies base64 Ed25519 signatures against registered public keys.
///
/// Unknown app ids never verify.
#[derive(Clone, Default)]
pub struct Ed25519Verifier {
    keys: HashMap<String, VerifyingKey>,
}

impl Ed25519Verifier {
    /// Creates a verifier with no keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the public key for `app_id`.
    #[must_use]
    pub fn with_key(mut self, app_id: impl Into<String>, key: VerifyingKey) -> Self {
        self.keys.insert(app_id.into(), key);
        self
    }

    /// Registers a base64-encoded 32-byte public key for `app_id`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key cannot be decoded.
    pub fn with_base64_key(self, app_id: impl Into<String>, key: &str) -> CovenantResult<Self> {
        let bytes: [u8; 32] = STANDARD
            .decode(key.trim())
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| CovenantError::configuration("public key must be 32 base64 bytes"))?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|e| {
            CovenantError::configuration(format!("invalid ed25519 public key: {e}"))
        })?;
        Ok(self.with_key(app_id, key))
    }

    /// Returns the number of registered apps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no keys are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl fmt::Debug for Ed25519Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Verifier")
            .field("apps", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl SignatureVerifier for Ed25519Verifier {
    async fn verify(&self, app_id: &str, digest: &[u8; 32], signature: &str) -> bool {
        let Some(key) = self.keys.get(app_id) else {
            return false;
        };
        let Some(bytes) = STANDARD
            .decode(signature)
            .ok()
            .and_then(|bytes| <[u8; 64]>::try_from(bytes).ok())
        else {
            return false;
        };
        key.verify_strict(digest, &Signature::from_bytes(&bytes))
            .is_ok()
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` value.
///
/// The scheme is matched case-insensitively. Other schemes yield `None`.
#[must_use]
pub fn bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn keypair() -> (SigningKey, VerifyingKey) {
        let signing = SigningKey::from_bytes(&[42u8; 32]);
        let verifying = signing.verifying_key();
        (signing, verifying)
    }

    #[tokio::test]
    async fn test_verifies_known_app() {
        let (signing, verifying) = keypair();
        let verifier = Ed25519Verifier::new().with_key("billing", verifying);
        let digest = [1u8; 32];
        let signature = STANDARD.encode(signing.sign(&digest).to_bytes());

        assert!(verifier.verify("billing", &digest, &signature).await);
        assert!(!verifier.verify("other", &digest, &signature).await);
        assert!(!verifier.verify("billing", &[2u8; 32], &signature).await);
        assert!(!verifier.verify("billing", &digest, "garbage").await);
    }

    #[test]
    fn test_base64_key() {
        let (_, verifying) = keypair();
        let encoded = STANDARD.encode(verifying.as_bytes());

        let verifier = Ed25519Verifier::new()
            .with_base64_key("billing", &encoded)
            .unwrap();
        assert_eq!(verifier.len(), 1);

        assert!(Ed25519Verifier::new()
            .with_base64_key("billing", "c2hvcnQ=")
            .is_err());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic dXNlcg=="), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
