//! HTTP-date formatting and parsing for conditional requests.

use chrono::{DateTime, Utc};

/// Render a timestamp in RFC 7231 IMF-fixdate form, e.g.
/// `Mon, 02 Jan 2006 15:04:05 GMT`.
pub fn format_http_date(t: &DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an `If-Modified-Since`-style header value. Returns `None` for
/// anything unparsable; callers treat that as "no condition".
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
