//! Cookie-header parsing
//!
//! The CSRF token arrives as a cookie set by the API origin; hosts hand
//! the raw `Cookie` header (or `document.cookie` string) to this helper
//! and feed the result into the token store.

/// Extract a cookie value by name from a `;`-separated cookie string
#[must_use]
pub fn cookie_value(cookie_header: &str, name: &str) -> Option<String> {
    cookie_header.split(';').find_map(|part| {
        let part = part.trim();
        let value = part.strip_prefix(name)?.strip_prefix('=')?;
        urlencoding::decode(value).ok().map(|v| v.into_owned())
    })
}

/// The CSRF cookie name used by the API origin
pub const CSRF_COOKIE: &str = "csrftoken";
