//! HMAC-signed opaque values.
//!
//! Values crossing a trust boundary (session cookies, OAuth state) are
//! signed as `base64(payload) | base64(hmac_sha256(secret, payload))`.
//! Verification is fail-closed: any structural or MAC failure yields an
//! error and never a partially-trusted payload.

use crate::error::SignedValueError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const SEPARATOR: char = '|';

/// Signs and verifies opaque string payloads with a shared secret.
#[derive(Clone)]
pub struct SignedValueCodec {
    secret: Vec<u8>,
}

impl SignedValueCodec {
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Produces the signed wire form of `payload`.
    #[must_use]
    pub fn sign(&self, payload: &str) -> String {
        let mac = self.compute_mac(payload.as_bytes());
        format!(
            "{}{}{}",
            BASE64.encode(payload.as_bytes()),
            SEPARATOR,
            BASE64.encode(mac)
        )
    }

    /// Verifies a signed value and returns the original payload.
    pub fn verify(&self, value: &str) -> Result<String, SignedValueError> {
        let mut parts = value.split(SEPARATOR);
        let (Some(payload_b64), Some(mac_b64), None) =
            (parts.next(), parts.next(), parts.next())
        else {
            tracing::warn!("rejected signed value: wrong segment count");
            return Err(SignedValueError::Malformed);
        };

        let payload_bytes = BASE64.decode(payload_b64).map_err(|e| {
            tracing::warn!(error = %e, "rejected signed value: payload not base64");
            SignedValueError::BadEncoding
        })?;
        let sent_mac = BASE64.decode(mac_b64).map_err(|e| {
            tracing::warn!(error = %e, "rejected signed value: mac not base64");
            SignedValueError::BadEncoding
        })?;

        let expected_mac = self.compute_mac(&payload_bytes);
        if !mac_eq(&expected_mac, &sent_mac) {
            tracing::warn!("rejected signed value: mac mismatch");
            return Err(SignedValueError::MacMismatch);
        }

        String::from_utf8(payload_bytes).map_err(|e| {
            tracing::warn!(error = %e, "rejected signed value: payload not utf-8");
            SignedValueError::BadEncoding
        })
    }

    fn compute_mac(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("hmac accepts keys of any size");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for SignedValueCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedValueCodec").finish_non_exhaustive()
    }
}

fn mac_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
