//! Identity cookie handling.
//!
//! The player id travels in a single HttpOnly cookie. Parsing and issuing
//! are small enough that no cookie crate is warranted.

use axum::http::header::{HeaderMap, HeaderValue, COOKIE};

use garden_core::types::PlayerId;

/// Extract the player id from the request's `Cookie` header, if present
/// and well-formed.
pub fn player_id(headers: &HeaderMap, cookie_name: &str) -> Option<PlayerId> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name.trim() == cookie_name {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// Build the `Set-Cookie` value binding a player id for `max_age_days`.
/// HttpOnly and SameSite=Lax: the id is opaque, never script-visible, and
/// never sent cross-site.
pub fn issue(cookie_name: &str, id: PlayerId, max_age_days: u32) -> Option<HeaderValue> {
    let max_age = u64::from(max_age_days) * 86_400;
    HeaderValue::from_str(&format!(
        "{cookie_name}={id}; Max-Age={max_age}; Path=/; HttpOnly; SameSite=Lax"
    ))
    .ok()
}
