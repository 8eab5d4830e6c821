//! Tolerant JSON parsing for decoded token segments
//!
//! Some issuers emit segments a strict parser rejects: escapes such as `\'`,
//! unpaired UTF-16 surrogates, raw control characters inside strings, or
//! escape sequences escaped a second time (`\\u00e9` for `é`). Text is
//! parsed strictly first; only on failure is it repaired and parsed again.

use serde_json::Value;
use tracing::debug;

const REPLACEMENT: &str = "\\ufffd";

/// Parse JSON, repairing non-standard string escapes if strict parsing fails
///
/// # Errors
///
/// Returns the error of the second, post-repair parse.
pub fn parse_lenient(bytes: &[u8]) -> Result<Value, serde_json::Error> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(value),
        Err(strict) => {
            debug!(error = %strict, "Strict JSON parse failed, repairing escapes");
            let text = String::from_utf8_lossy(bytes);
            serde_json::from_str(&repair(&text))
        }
    }
}

/// Rewrite string literals so that every escape is valid JSON
pub fn repair(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = false;
                out.push(c);
                i += 1;
            }
            '\\' => i = repair_escape(&chars, i, &mut out),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

// Handles the escape starting at chars[i] == '\\', returns the next index
fn repair_escape(chars: &[char], i: usize, out: &mut String) -> usize {
    if let Some((unit, next)) = unicode_escape(chars, i) {
        if is_high_surrogate(unit) {
            if let Some((low, after)) = unicode_escape(chars, next)
                && is_low_surrogate(low)
            {
                out.push_str(&format!("\\u{unit:04x}\\u{low:04x}"));
                return after;
            }
            out.push_str(REPLACEMENT);
            return next;
        }
        if is_low_surrogate(unit) {
            out.push_str(REPLACEMENT);
            return next;
        }
        out.push_str(&format!("\\u{unit:04x}"));
        return next;
    }

    match chars.get(i + 1) {
        Some(&e @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't')) => {
            out.push('\\');
            out.push(e);
            i + 2
        }
        // Unknown escape: keep the escaped character, drop the backslash
        Some(&e) if (e as u32) < 0x20 => {
            out.push_str(&format!("\\u{:04x}", e as u32));
            i + 2
        }
        Some(&e) => {
            out.push(e);
            i + 2
        }
        None => {
            out.push_str("\\\\");
            i + 1
        }
    }
}

// Reads `\uXXXX` or the doubly escaped `\\uXXXX` at chars[i]
fn unicode_escape(chars: &[char], i: usize) -> Option<(u32, usize)> {
    let start = match (chars.get(i), chars.get(i + 1), chars.get(i + 2)) {
        (Some('\\'), Some('u'), _) => i + 2,
        (Some('\\'), Some('\\'), Some('u')) => i + 3,
        _ => return None,
    };
    let hex: String = chars.get(start..start + 4)?.iter().collect();
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let unit = u32::from_str_radix(&hex, 16).ok()?;
    Some((unit, start + 4))
}

fn is_high_surrogate(unit: u32) -> bool {
    (0xD800..=0xDBFF).contains(&unit)
}

fn is_low_surrogate(unit: u32) -> bool {
    (0xDC00..=0xDFFF).contains(&unit)
}
