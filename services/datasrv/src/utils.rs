//! Shared helpers for identifiers and duration strings

use std::time::Duration;

use tracing::warn;

use crate::error::{DataSrvError, Result};

/// Sanitize an identifier to the `[A-Za-z0-9_-]` alphabet.
///
/// Whitespace and any other character is replaced by `_`. A rewrite is
/// logged as a warning but is not fatal; an empty identifier is a
/// configuration error.
pub fn sanitize_id(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DataSrvError::config("Identifier must not be empty"));
    }

    let sanitized: String = trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized != trimmed {
        warn!("Identifier '{}' sanitized to '{}'", raw, sanitized);
    }
    Ok(sanitized)
}

/// Parse a duration string like `"500ms"`, `"60s"`, `"5m"` or `"1h"`.
///
/// A bare number is taken as seconds.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let s = raw.trim().to_lowercase();
    if s.is_empty() {
        return Err(DataSrvError::data("Empty duration string"));
    }

    let (digits, unit): (String, String) = s.chars().partition(|c| c.is_ascii_digit());
    let number: u64 = digits
        .parse()
        .map_err(|_| DataSrvError::data(format!("Invalid duration: '{raw}'")))?;

    match unit.trim() {
        "" | "s" | "sec" => Ok(Duration::from_secs(number)),
        "ms" => Ok(Duration::from_millis(number)),
        "m" | "min" => Ok(Duration::from_secs(number * 60)),
        "h" => Ok(Duration::from_secs(number * 3600)),
        "d" => Ok(Duration::from_secs(number * 86400)),
        other => Err(DataSrvError::data(format!(
            "Invalid duration unit '{other}' in '{raw}'"
        ))),
    }
}
