//! Route-template matching.
//!
//! A [`RouteTable`] is an ordered list of `"METHOD /template"` entries where
//! `{name}` segments capture positional variables and everything else must
//! match literally. Matching is a pure function of (method, path): the table
//! is evaluated in declaration order and the first template whose segments
//! all match wins — later, more specific entries are unreachable once an
//! earlier entry matches the same shape. Captured variables plus the entry's
//! preset fields are merged into the result, presets winning. A preset
//! `method: "skip"` turns an otherwise-matched route into not-found, which
//! is how known noise paths (favicon requests) are silenced.
use serde_json::{Map, Value};
use thiserror::Error;

/// Up to five path segments are matched; deeper paths never match.
pub const MAX_SEGMENTS: usize = 5;

/// Error type for route-template parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("route template '{0}' must read 'METHOD /path'")]
    Malformed(String),
    #[error("route template '{0}' exceeds {MAX_SEGMENTS} path segments")]
    TooDeep(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
}

/// One parsed route template with its preset fields.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    template: String,
    method: String,
    segments: Vec<Segment>,
    preset: Map<String, Value>,
}

impl RouteEntry {
    /// Parse a `"METHOD /template/with/{captures}"` string.
    pub fn parse(template: &str, preset: Map<String, Value>) -> Result<Self, RouteError> {
        let (method, path) = template
            .split_once(' ')
            .ok_or_else(|| RouteError::Malformed(template.to_string()))?;
        if method.is_empty() || !method.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(RouteError::Malformed(template.to_string()));
        }
        if !path.starts_with('/') {
            return Err(RouteError::Malformed(template.to_string()));
        }
        let segments: Vec<Segment> = split_segments(path)
            .into_iter()
            .map(|segment| {
                segment
                    .strip_prefix('{')
                    .and_then(|s| s.strip_suffix('}'))
                    .map(|name| Segment::Capture(name.to_string()))
                    .unwrap_or_else(|| Segment::Literal(segment.to_string()))
            })
            .collect();
        if segments.len() > MAX_SEGMENTS {
            return Err(RouteError::TooDeep(template.to_string()));
        }
        Ok(Self {
            template: template.to_string(),
            method: method.to_string(),
            segments,
            preset,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Match one request against this template. Literal segments must match
    /// exactly; capture segments bind any non-empty request segment.
    fn matches(&self, method: &str, segments: &[&str]) -> Option<Map<String, Value>> {
        if method != self.method || segments.len() != self.segments.len() {
            return None;
        }
        let mut captured = Map::new();
        for (segment, requested) in self.segments.iter().zip(segments) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != requested {
                        return None;
                    }
                }
                Segment::Capture(name) => {
                    if requested.is_empty() {
                        return None;
                    }
                    captured.insert(name.clone(), Value::String((*requested).to_string()));
                }
            }
        }
        // Presets override captures, matching the original merge order.
        for (key, value) in &self.preset {
            captured.insert(key.clone(), value.clone());
        }
        Some(captured)
    }
}

/// Outcome of a table lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteMatch {
    /// Captured variables merged with the entry's presets.
    Matched(Map<String, Value>),
    /// A route matched but its preset `method` is `"skip"`.
    Skipped,
    NoMatch,
}

/// Ordered, first-match-wins route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        Self { entries }
    }

    /// Build a table from `(template, preset)` pairs, preserving order.
    pub fn parse(routes: &[(String, Map<String, Value>)]) -> Result<Self, RouteError> {
        let entries = routes
            .iter()
            .map(|(template, preset)| RouteEntry::parse(template, preset.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(entries))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a request. A trailing slash on a non-root path is stripped
    /// before matching so `/Article/` and `/Article` hit the same entry.
    pub fn lookup(&self, method: &str, path: &str) -> RouteMatch {
        let normalized = if path.len() > 1 {
            path.strip_suffix('/').unwrap_or(path)
        } else {
            path
        };
        let segments = split_segments(normalized);
        if segments.len() > MAX_SEGMENTS {
            return RouteMatch::NoMatch;
        }
        for entry in &self.entries {
            if let Some(data) = entry.matches(method, &segments) {
                if data.get("method").and_then(Value::as_str) == Some("skip") {
                    return RouteMatch::Skipped;
                }
                return RouteMatch::Matched(data);
            }
        }
        RouteMatch::NoMatch
    }
}

fn split_segments(path: &str) -> Vec<&str> {
    path.trim_start_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn preset(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn table() -> RouteTable {
        RouteTable::parse(&[
            (
                "GET /".to_string(),
                preset(json!({ "dataType": "Document", "id": "home" })),
            ),
            (
                "GET /favicon.ico".to_string(),
                preset(json!({ "method": "skip" })),
            ),
            ("GET /{dataType}".to_string(), preset(json!({}))),
            ("GET /{dataType}/{id}".to_string(), preset(json!({}))),
            (
                "POST /User/authenticate".to_string(),
                preset(json!({ "dataType": "User", "method": "authenticate" })),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_first_declared_match_wins() {
        // "GET /" matches the first entry even though later captures exist.
        match table().lookup("GET", "/") {
            RouteMatch::Matched(data) => {
                assert_eq!(data.get("dataType"), Some(&json!("Document")));
                assert_eq!(data.get("id"), Some(&json!("home")));
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn test_captures_bind_positionally() {
        match table().lookup("GET", "/Article/42") {
            RouteMatch::Matched(data) => {
                assert_eq!(data.get("dataType"), Some(&json!("Article")));
                assert_eq!(data.get("id"), Some(&json!("42")));
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn test_matching_is_deterministic() {
        let table = table();
        let first = table.lookup("GET", "/Article/42");
        let second = table.lookup("GET", "/Article/42");
        assert_eq!(first, second);
    }

    #[test]
    fn test_trailing_slash_is_normalized() {
        let table = table();
        assert_eq!(table.lookup("GET", "/Article/"), table.lookup("GET", "/Article"));
        assert!(matches!(table.lookup("GET", "/Article/"), RouteMatch::Matched(_)));
    }

    #[test]
    fn test_skip_preset_is_not_found() {
        assert_eq!(table().lookup("GET", "/favicon.ico"), RouteMatch::Skipped);
    }

    #[test]
    fn test_presets_override_captures() {
        // "POST /User/authenticate" would also shape-match nothing else, but
        // its preset method must override any captured value.
        match table().lookup("POST", "/User/authenticate") {
            RouteMatch::Matched(data) => {
                assert_eq!(data.get("method"), Some(&json!("authenticate")));
                assert_eq!(data.get("dataType"), Some(&json!("User")));
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn test_method_must_match() {
        assert_eq!(table().lookup("DELETE", "/Article"), RouteMatch::NoMatch);
    }

    #[test]
    fn test_deep_paths_never_match() {
        assert_eq!(
            table().lookup("GET", "/a/b/c/d/e/f"),
            RouteMatch::NoMatch
        );
    }

    #[test]
    fn test_malformed_templates_are_rejected() {
        assert!(RouteEntry::parse("get /lower", Map::new()).is_err());
        assert!(RouteEntry::parse("GET", Map::new()).is_err());
        assert!(RouteEntry::parse("GET article", Map::new()).is_err());
        assert!(RouteEntry::parse("GET /a/b/c/d/e/f", Map::new()).is_err());
    }
}
