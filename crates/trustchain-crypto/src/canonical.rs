//! Deterministic JSON canonicalization.
//!
//! Signing and verification must agree on the exact bytes of a payload.
//! Canonicalization sorts object keys recursively (objects nested inside
//! arrays included) and serializes compactly, so two semantically equal
//! values with different key insertion order produce identical bytes.
//! Numbers serialize exactly as `serde_json` renders them; no float
//! renormalization is applied.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::error::{CryptoError, CryptoResult};

/// Maximum nesting depth accepted by [`canonical_bytes`].
pub const MAX_CANONICAL_DEPTH: usize = 128;

/// Produce the canonical byte representation of a JSON value.
///
/// # Errors
///
/// Returns [`CryptoError::CanonicalizationDepth`] when nesting exceeds
/// [`MAX_CANONICAL_DEPTH`].
pub fn canonical_bytes(value: &Value) -> CryptoResult<Vec<u8>> {
    let mut out = String::new();
    write_canonical(value, &mut out, 0)?;
    Ok(out.into_bytes())
}

fn write_canonical(value: &Value, out: &mut String, depth: usize) -> CryptoResult<()> {
    if depth > MAX_CANONICAL_DEPTH {
        return Err(CryptoError::CanonicalizationDepth {
            limit: MAX_CANONICAL_DEPTH,
        });
    }

    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        // serde_json renders integers exactly and floats via shortest
        // roundtrip; both are deterministic.
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_escaped(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out, depth.saturating_add(1))?;
            }
            out.push(']');
        },
        Value::Object(map) => {
            // BTreeMap gives byte-lexicographic key order.
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            out.push('{');
            for (i, (key, item)) in sorted.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(key, out);
                out.push(':');
                write_canonical(item, out, depth.saturating_add(1))?;
            }
            out.push('}');
        },
    }

    Ok(())
}

/// JSON string escaping, matching `serde_json`'s compact output.
fn write_escaped(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                // Remaining control characters use \u00XX form.
                let _ = write!(out, "\\u{:04x}", c as u32);
            },
            c => out.push(c),
        }
    }
    out.push('"');
}
