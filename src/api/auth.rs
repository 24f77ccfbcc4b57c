//! Bearer-token check for the cron endpoint

use axum::http::{header::AUTHORIZATION, HeaderMap};

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Whether the request carries `secret` as its bearer token
///
/// Both sides are hashed first so the comparison takes the same time
/// whatever the token length or contents.
pub fn is_authorized(headers: &HeaderMap, secret: &str) -> bool {
    match bearer_token(headers) {
        Some(token) => blake3::hash(token.as_bytes()) == blake3::hash(secret.as_bytes()),
        None => false,
    }
}
