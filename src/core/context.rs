//! Per-request context map.
//!
//! A [`Context`] is the mutable field map threaded through the stage chain.
//! It is created fresh per request, exclusively owned by that request, and
//! never shared across requests. Stages add, overwrite and delete fields as
//! the chain progresses; `merge` is overwrite-on-collision and therefore
//! idempotent.
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    fields: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON value. Non-object values (including the
    /// absent section passed to a successor stage) yield an empty context.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Merge another context in; colliding keys take the incoming value.
    pub fn merge(&mut self, other: Context) {
        for (key, value) in other.fields {
            self.fields.insert(key, value);
        }
    }

    /// Merge a JSON object in; colliding keys take the incoming value.
    pub fn merge_object(&mut self, object: &Map<String, Value>) {
        for (key, value) in object {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Remove the sub-object stored under `key` and return it as a context
    /// of its own. Used when constructing a successor stage: the section is
    /// consumed here so it does not leak to the next constructor. Only
    /// object values are sections; a scalar under `key` (such as the
    /// `driver` name the model emits) stays in place.
    pub fn take_section(&mut self, key: &str) -> Context {
        match self.fields.get(key) {
            Some(Value::Object(_)) => match self.fields.remove(key) {
                Some(Value::Object(fields)) => Self { fields },
                _ => Self::new(),
            },
            _ => Self::new(),
        }
    }

    pub fn as_object(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for Context {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn context_of(value: Value) -> Context {
        Context::from_value(value)
    }

    #[test]
    fn test_merge_overwrites_and_is_idempotent() {
        let mut context = context_of(json!({ "a": 1 }));
        let incoming = json!({ "a": 1, "b": 2 });

        context.merge_object(incoming.as_object().unwrap());
        context.merge_object(incoming.as_object().unwrap());

        assert_eq!(context.get("a"), Some(&json!(1)));
        assert_eq!(context.get("b"), Some(&json!(2)));
        assert_eq!(context.as_object().len(), 2);
    }

    #[test]
    fn test_take_section_consumes_key() {
        let mut context = context_of(json!({
            "model": { "pageSize": "25" },
            "dataType": "Article"
        }));

        let section = context.take_section("model");
        assert_eq!(section.get_str("pageSize"), Some("25"));
        assert!(!context.contains("model"));
        assert_eq!(context.get_str("dataType"), Some("Article"));
    }

    #[test]
    fn test_take_section_leaves_scalar_fields_in_place() {
        let mut context = context_of(json!({ "driver": "Json" }));
        assert!(context.take_section("driver").is_empty());
        assert_eq!(context.get_str("driver"), Some("Json"));
    }

    #[test]
    fn test_take_missing_section_is_empty() {
        let mut context = context_of(json!({ "a": 1 }));
        assert!(context.take_section("session").is_empty());
    }

    #[test]
    fn test_non_object_value_yields_empty_context() {
        assert!(context_of(json!("scalar")).is_empty());
        assert!(context_of(json!(null)).is_empty());
    }
}
