//! RFC 6901 JSON Pointer evaluation over claim trees
//!
//! Unlike `serde_json::Value::pointer`, evaluation reports why a pointer did
//! not resolve, so callers can log a precise diagnostic.

use serde_json::Value;

use crate::error::PointerError;

/// Split a pointer into unescaped reference tokens.
///
/// `~1` becomes `/` and `~0` becomes `~`, in that order.
///
/// # Errors
///
/// Returns [`PointerError::Syntax`] if the pointer is non-empty and does not
/// start with `/`, and [`PointerError::InvalidEscape`] for a dangling `~`.
pub fn parse_pointer(pointer: &str) -> Result<Vec<String>, PointerError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(PointerError::Syntax(pointer.to_string()));
    };

    rest.split('/').map(unescape_token).collect()
}

fn unescape_token(raw: &str) -> Result<String, PointerError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return Err(PointerError::InvalidEscape(raw.to_string())),
        }
    }
    Ok(out)
}

/// Resolve `pointer` against `root`.
///
/// # Errors
///
/// Returns a [`PointerError`] describing the first segment that failed.
pub fn resolve<'a>(root: &'a Value, pointer: &str) -> Result<&'a Value, PointerError> {
    let mut current = root;
    for segment in parse_pointer(pointer)? {
        current = match current {
            Value::Object(map) => map.get(&segment),
            Value::Array(items) => parse_index(&segment).and_then(|i| items.get(i)),
            other => {
                return Err(PointerError::NotAContainer {
                    segment,
                    found: type_name(other),
                });
            }
        }
        .ok_or_else(|| PointerError::NotFound {
            segment: segment.clone(),
        })?;
    }
    Ok(current)
}

// Array indices are decimal without leading zeros; "-" never resolves
fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty()
        || !segment.bytes().all(|b| b.is_ascii_digit())
        || (segment.len() > 1 && segment.starts_with('0'))
    {
        return None;
    }
    segment.parse().ok()
}

/// JSON type name, for diagnostics
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
