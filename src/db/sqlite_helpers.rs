//! SQLite helper utilities for type conversion
//!
//! Statuses and media types are stored as text, booleans as integers and
//! timestamps as RFC 3339 strings.

use std::str::FromStr;

use chrono::Utc;

/// Current UTC timestamp as ISO8601 string for SQLite
#[inline]
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339()
}

/// Convert bool to SQLite integer
#[inline]
pub fn bool_to_int(b: bool) -> i32 {
    if b { 1 } else { 0 }
}

/// Parse a text column into an enum, reporting failures as decode errors
pub fn decode_text<T>(column: &str, value: &str) -> sqlx::Result<T>
where
    T: FromStr<Err = anyhow::Error>,
{
    value.parse().map_err(|e: anyhow::Error| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: e.into(),
    })
}
