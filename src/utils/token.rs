//! Bearer-token claim inspection
//!
//! The access token is a JWT issued by the authentication service. The
//! client never validates it (that is the server's job); it only peeks at
//! the `exp` claim to schedule proactive refreshes before a request would
//! bounce with a 401.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, TimeZone, Utc};

/// Decode the payload segment of a JWT without verifying the signature
///
/// # Errors
///
/// Returns an error if the token is not three dot-separated segments, the
/// payload is not valid base64, or the payload is not JSON.
pub fn decode_payload(token: &str) -> Result<serde_json::Value, String> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid JWT format".to_string());
    }

    let payload_b64 = parts[1];
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .or_else(|_| general_purpose::STANDARD.decode(payload_b64))
        .map_err(|_| "Base64 decode failed")?;

    let payload_str = String::from_utf8(payload_bytes).map_err(|_| "UTF-8 decode failed")?;

    serde_json::from_str(&payload_str).map_err(|_| "JSON parse failed".to_string())
}

/// Extract the `exp` claim as an instant, when present and well-formed
#[must_use]
pub fn expiry_of(token: &str) -> Option<DateTime<Utc>> {
    let claims = decode_payload(token).ok()?;
    let exp = claims.get("exp").and_then(serde_json::Value::as_i64)?;
    match Utc.timestamp_opt(exp, 0) {
        chrono::LocalResult::Single(dt) => Some(dt),
        _ => None,
    }
}

/// Whether the token expires within `window_seconds` from now
///
/// Opaque (non-JWT) tokens report `false`: with no readable expiry there
/// is nothing to act on proactively, and the 401 path still covers them.
#[must_use]
pub fn expires_within(token: &str, window_seconds: i64) -> bool {
    expiry_of(token).is_some_and(|expiry| {
        expiry <= Utc::now() + chrono::Duration::seconds(window_seconds)
    })
}
