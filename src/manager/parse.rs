//! Tolerant parsing of free-form Manager replies.
//!
//! The response parser must be tolerant of free-form prose: missing
//! structured fields default to empty/zero; a reply that cannot be
//! coerced at all is `ManagerProtocol`. Real backends are expected to
//! reply with JSON most of the time but occasionally wrap it in prose or
//! markdown fences; this module extracts the first balanced `{...}` object
//! it can find and fills in defaults for anything `serde_json` can't
//! match, rather than failing the whole call over a missing field.

use serde::de::DeserializeOwned;

use crate::errors::ManagerError;

/// Find the first top-level `{...}` object in `text` (tracking brace depth
/// so nested objects don't confuse the scan) and parse it as `T`. Falls
/// back to parsing the whole trimmed string if no braces are found. Any
/// failure to locate or parse is a `ManagerError::Protocol`.
pub fn parse_loose<T: DeserializeOwned + Default>(text: &str) -> Result<T, ManagerError> {
    if let Some(json) = extract_first_json_object(text) {
        if let Ok(value) = serde_json::from_str::<T>(&json) {
            return Ok(value);
        }
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ManagerError::Protocol("empty reply".to_string()));
    }

    serde_json::from_str::<T>(trimmed)
        .map_err(|e| ManagerError::Protocol(format!("could not parse reply as structured data: {e}")))
}

/// Same as [`parse_loose`] but returns `T::default()` instead of failing
/// when nothing structured can be found — used where a missing reply is
/// treated as "empty/zero" rather than a protocol error (e.g. an
/// `Analysis` with no blockers is a perfectly valid assessment).
pub fn parse_loose_or_default<T: DeserializeOwned + Default>(text: &str) -> T {
    parse_loose(text).unwrap_or_default()
}

fn extract_first_json_object(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        let ch = b as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some(text[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
