//! Cookie header (un)serialization.
//!
//! The engine only needs the `name=value` pairs; attributes like `Path` or
//! `Expires` that appear after the first `=` of a pair are kept verbatim in
//! the value.
use std::collections::HashMap;

/// Parse a `Cookie:` header value (`name=value; name2=value2`) into a map.
/// Malformed pairs without `=` are skipped.
pub fn unserialize(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Render cookie pairs back into header form.
pub fn serialize(cookies: &HashMap<String, String>) -> String {
    let mut pairs: Vec<String> = cookies
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    // Deterministic output for logging and tests.
    pairs.sort();
    pairs.join("; ")
}
