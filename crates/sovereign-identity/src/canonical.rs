//! Canonical JSON serialization.
//!
//! Signing and verifying must operate on byte-identical input, so
//! documents are rendered with object keys sorted recursively and no
//! whitespace. The writer does not rely on `serde_json`'s map ordering,
//! which changes when the `preserve_order` feature is unified in.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Render a JSON value canonically.
pub fn to_canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Serialize any value to JSON, then render it canonically.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)?;
    Ok(to_canonical_string(&value))
}

/// Hex SHA-256 of the canonical rendering.
pub fn canonical_hash(value: &Value) -> String {
    hex::encode(Sha256::digest(to_canonical_string(value).as_bytes()))
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(k, out);
                out.push(':');
                write_value(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(v, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        // Scalars already have a single compact form.
        other => out.push_str(&other.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    // Escaping a str through serde_json cannot fail.
    out.push_str(&Value::String(s.to_owned()).to_string());
}
