//! Canonical hashing.
//!
//! Derived-data change detection hashes canonical JSON (RFC 8785 JCS) with
//! BLAKE3, so two builds producing the same derived sets hash identically
//! regardless of field order or formatting.

use crate::error::ManifestError;

/// Computes the canonical BLAKE3 hash of a JSON value.
///
/// ```text
/// hash = hex(BLAKE3(JCS(value)))
/// ```
///
/// Returns a 64-character lowercase hexadecimal string.
pub fn canonical_value_hash(value: &serde_json::Value) -> Result<String, ManifestError> {
    let canonical = canonicalize_json(value);
    let hash = blake3::hash(canonical.as_bytes());
    Ok(hash.to_hex().to_string())
}

/// Computes the change-detection hash of a permission set.
///
/// The set is hashed as a sorted JSON array, so insertion order never
/// affects the result.
pub fn permission_set_hash<I, S>(permissions: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sorted: Vec<String> = permissions
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect();
    sorted.sort();
    sorted.dedup();
    let value = serde_json::Value::Array(sorted.into_iter().map(serde_json::Value::String).collect());
    blake3::hash(canonicalize_json(&value).as_bytes())
        .to_hex()
        .to_string()
}

/// Canonicalizes a JSON value according to RFC 8785 (JCS).
///
/// Object keys are sorted lexicographically, no whitespace between tokens,
/// strings use minimal escaping.
pub fn canonicalize_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => format_jcs_number(n),
        serde_json::Value::String(s) => format_jcs_string(s),
        serde_json::Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(canonicalize_json).collect();
            format!("[{}]", items.join(","))
        }
        serde_json::Value::Object(obj) => {
            let mut sorted_keys: Vec<&String> = obj.keys().collect();
            sorted_keys.sort();

            let pairs: Vec<String> = sorted_keys
                .iter()
                .map(|k| {
                    let v = &obj[*k];
                    format!("{}:{}", format_jcs_string(k), canonicalize_json(v))
                })
                .collect();
            format!("{{{}}}", pairs.join(","))
        }
    }
}

/// Formats a number according to JCS rules.
fn format_jcs_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    if let Some(f) = n.as_f64() {
        if f.is_nan() || f.is_infinite() {
            return "null".to_string(); // JCS treats these as null
        }
        if f == 0.0 {
            return "0".to_string();
        }
        if f.fract() == 0.0 && f.abs() < 1e15 {
            return format!("{}", f as i64);
        }
        let s = format!("{}", f);
        if s.contains('.') && !s.contains('e') && !s.contains('E') {
            let trimmed = s.trim_end_matches('0').trim_end_matches('.');
            return trimmed.to_string();
        }
        s
    } else {
        "null".to_string()
    }
}

/// Formats a string according to JCS rules.
fn format_jcs_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('"');
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c < '\x20' => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result.push('"');
    result
}
