//! Server-to-server request signing.
//!
//! Both sides build the same [`SigningPayload`] from a request: the client
//! before sending it, the server after receiving it. The payload is rendered
//! as JSON with every object's keys sorted, hashed with SHA-256, and the
//! digest is what gets signed and verified.
//!
//! The signature algorithm itself is pluggable; see the client's
//! `RequestSigner` and the server's `SignatureVerifier`.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Header carrying the signing timestamp in epoch milliseconds.
pub const TIMESTAMP_HEADER: &str = "x-ba-request-timestamp";

/// Header carrying the calling application's id.
pub const APP_HEADER: &str = "x-ba-app";

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-ba-signature";

/// Header carrying the hex SHA-256 of the request body.
pub const CONTENT_SHA256_HEADER: &str = "x-amz-content-sha256";

/// The fields covered by a server-to-server signature.
#[derive(Debug, Clone, PartialEq)]
pub struct SigningPayload {
    /// Calling application id.
    pub app_id: String,
    /// Request path including the query string, as sent on the wire.
    pub path: String,
    /// Signing time in epoch milliseconds.
    pub timestamp: i64,
    /// Parsed JSON body, for methods that send one.
    pub body: Option<Value>,
}

impl SigningPayload {
    /// Renders the payload as canonical JSON.
    ///
    /// Keys are sorted at every level and no whitespace is emitted, so equal
    /// payloads always produce identical bytes.
    #[must_use]
    pub fn canonical_json(&self) -> String {
        let mut object = serde_json::Map::new();
        object.insert("appId".into(), Value::String(self.app_id.clone()));
        if let Some(body) = &self.body {
            object.insert("body".into(), body.clone());
        }
        object.insert("path".into(), Value::String(self.path.clone()));
        object.insert("timestamp".into(), Value::from(self.timestamp));
        canonicalize(&Value::Object(object))
    }

    /// Returns the SHA-256 digest of the canonical JSON.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(self.canonical_json().as_bytes()).into()
    }
}

/// Renders a JSON value with object keys sorted recursively.
#[must_use]
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Returns the lowercase hex SHA-256 of a request body.
#[must_use]
pub fn content_sha256(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Returns whether `timestamp_ms` lies within `tolerance_ms` of `now_ms`.
#[must_use]
pub const fn is_within_tolerance(timestamp_ms: i64, now_ms: i64, tolerance_ms: i64) -> bool {
    let skew = now_ms.saturating_sub(timestamp_ms);
    skew.saturating_abs() <= tolerance_ms
}
