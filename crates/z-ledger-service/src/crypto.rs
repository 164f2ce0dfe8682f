//! Signature and key comparison helpers.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 over `message` and return it hex-encoded (64 characters).
///
/// # Panics
///
/// Never in practice: HMAC-SHA256 accepts keys of any size (RFC 2104).
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &[u8]) -> String {
    // INVARIANT: `new_from_slice` only fails for fixed-size-key MACs.
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC-SHA256 accepts any key size");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a hex signature over `body`. Case-insensitive, constant-time.
#[must_use]
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let expected = hmac_sha256_hex(secret, body);
    constant_time_eq(&expected, &signature.trim().to_ascii_lowercase())
}

/// Constant-time string comparison.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
