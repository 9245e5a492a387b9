//! Common HTTP utilities and shared types

use axum::http::HeaderValue;
use serde::{Deserialize, Deserializer};

use crate::api::responses::PageError;

// ============================================================================
// Pagination Defaults
// ============================================================================

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// Default page size for admin lists
pub fn default_per_page() -> u32 {
    20
}

// ============================================================================
// Query Types
// ============================================================================

/// `?page=N` on HTML lists; anything unparsable is the first page
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn number(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1)
    }
}

/// Admin pagination query parameters
#[derive(Debug, Deserialize)]
pub struct AdminPaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// `?next=` of the login page
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Tell a missing field from an explicit `null`
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ============================================================================
// URLs
// ============================================================================

pub fn post_url(id: i64) -> String {
    format!("/posts/{}/", id)
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

/// Local redirect target, or `/` for anything that could leave the site
pub fn safe_next(next: Option<&str>) -> String {
    match next.map(str::trim) {
        Some(next) if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') => {
            next.to_string()
        }
        _ => "/".to_string(),
    }
}

/// Path segment holding a numeric id; anything else is a missing page
pub fn parse_id(raw: &str) -> Result<i64, PageError> {
    raw.parse::<i64>().map_err(|_| PageError::NotFound)
}

// ============================================================================
// Session cookie
// ============================================================================

pub fn session_cookie(token: &str, days: i64) -> Result<HeaderValue, PageError> {
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token,
        days * 24 * 60 * 60
    );
    HeaderValue::from_str(&cookie)
        .map_err(|e| PageError::Internal(format!("Invalid session cookie: {}", e)))
}

pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
