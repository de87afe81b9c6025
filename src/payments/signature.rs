//! Webhook signature verification.
//!
//! The gateway signs the raw request body with HMAC-SHA256 over the shared
//! webhook secret and sends the lowercase hex digest in a header. The
//! comparison is constant-time so signature checking does not leak timing
//! information.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the expected signature for a raw webhook body.
pub fn sign(body: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a webhook signature against the raw body bytes.
pub fn verify(body: &[u8], signature: &str, secret: &str) -> bool {
    let expected = sign(body, secret);
    constant_time_eq(expected.as_bytes(), signature.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
