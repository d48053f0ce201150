//! Webhook signature verification
//!
//! The provider signs the raw request body with HMAC-SHA512 keyed by the
//! shared webhook secret and sends the hex digest in `X-Notch-Signature`.

use crate::error::{AppError, AppResult};
use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

pub const SIGNATURE_HEADER: &str = "x-notch-signature";

fn keyed_mac(secret: &str) -> AppResult<HmacSha512> {
    if secret.is_empty() {
        return Err(AppError::configuration("webhook secret is not configured"));
    }
    HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::configuration(format!("invalid webhook secret: {}", e)))
}

/// Hex-encoded HMAC-SHA512 of `raw_body` under `secret`
pub fn sign(raw_body: &[u8], secret: &str) -> AppResult<String> {
    let mut mac = keyed_mac(secret)?;
    mac.update(raw_body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check `signature_header` against the HMAC of the untouched request bytes.
///
/// A header that is not hex, has the wrong length or simply differs yields
/// `Ok(false)`. Only a missing secret or header is an error. The comparison
/// runs in constant time.
pub fn verify(raw_body: &[u8], signature_header: &str, secret: &str) -> AppResult<bool> {
    let mut mac = keyed_mac(secret)?;

    let provided = signature_header.trim();
    if provided.is_empty() {
        return Err(AppError::configuration("signature header is empty"));
    }

    let Ok(provided) = hex::decode(provided) else {
        return Ok(false);
    };

    mac.update(raw_body);

    Ok(mac.verify_slice(&provided).is_ok())
}
