//! Request header helpers.
//!
//! # Responsibilities
//! - Read textual header values
//! - Parse conditional-request timestamps
//!
//! # Design Decisions
//! - Malformed or non-UTF-8 headers read as absent; requests never fail on them

use std::time::SystemTime;

use axum::http::header::{AsHeaderName, IF_MODIFIED_SINCE};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Textual value of a header, if present and valid.
pub fn header_str<K: AsHeaderName>(headers: &HeaderMap, name: K) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Client freshness timestamp from `If-Modified-Since`.
pub fn if_modified_since(headers: &HeaderMap) -> Option<SystemTime> {
    header_str(headers, IF_MODIFIED_SINCE).and_then(parse_http_date)
}

/// Parse an HTTP date (RFC 2822 form), falling back to RFC 3339.
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    let value = value.trim();
    let parsed = DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()?;
    Some(SystemTime::from(parsed.with_timezone(&Utc)))
}
