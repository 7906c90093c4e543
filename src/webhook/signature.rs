//! Request signature verification for the webhook surface.
//!
//! The platform signs every delivery with an HMAC-SHA256 of the raw body
//! keyed by the app secret, carried in the `X-Hub-Signature-256` header as
//! `sha256=<hex digest>`. Verification runs over the exact bytes received,
//! before any JSON parsing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// HMAC-SHA256 type alias.
type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Scheme prefix on the header value.
const SIGNATURE_PREFIX: &str = "sha256=";

/// Check a delivery signature against the raw body.
///
/// Returns `false` for a missing header, an unknown scheme, undecodable
/// hex, or a digest mismatch. The comparison itself is constant-time
/// (`verify_slice`).
pub fn verify(app_secret: &str, header_value: Option<&str>, body: &[u8]) -> bool {
    let Some(value) = header_value else {
        return false;
    };
    let Some(hex_digest) = value.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Produce the header value the platform would send for `body`.
///
/// Counterpart of [`verify`]; used by tests and local tooling to build
/// validly signed deliveries.
pub fn sign(app_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}
