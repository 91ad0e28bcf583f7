//! Storage backend port: the driver-agnostic operation contract.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Error type for storage backend operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BackendError {
    /// A single-item lookup found nothing.
    #[error("item was not found")]
    NotFound,
    /// The descriptor cannot be executed as given.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The backing store is unreachable or unreadable.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Normalized query/operation descriptor produced by the Model stage and
/// consumed by every concrete backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    pub operation: String,
    pub data_type: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Field name → accepted values. A document matches when every listed
    /// field holds one of its accepted values.
    #[serde(default)]
    pub filter: HashMap<String, Vec<String>>,
    /// Fields to include in results.
    #[serde(default)]
    pub fields: Vec<String>,
    /// Fields stripped from results even when listed in `fields`.
    #[serde(default)]
    pub hide_fields: Vec<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// `[field]` or `[field, "up"|"down"]`.
    #[serde(default)]
    pub sort: Vec<String>,
    #[serde(default)]
    pub is_collection: bool,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    100
}

impl OperationDescriptor {
    /// The fields effectively shown: `fields` minus `hide_fields`.
    pub fn visible_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .map(String::as_str)
            .filter(|field| !self.hide_fields.iter().any(|hidden| hidden == field))
            .collect()
    }
}

/// Result of a backend operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendResult {
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
}

impl BackendResult {
    /// A single-item result (no paging envelope).
    pub fn item(data: Value) -> Self {
        Self {
            data,
            size: None,
            page: None,
            page_size: None,
            total_size: None,
        }
    }

    /// A paged collection result.
    pub fn collection(data: Vec<Value>, page: u64, page_size: u64, total_size: u64) -> Self {
        Self {
            size: Some(data.len() as u64),
            data: Value::Array(data),
            page: Some(page),
            page_size: Some(page_size),
            total_size: Some(total_size),
        }
    }
}

/// StorageBackend defines the port (interface) for executing operation
/// descriptors against a concrete document store.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Execute one operation descriptor.
    ///
    /// # Returns
    /// The matching data (paged for collections) or a tagged failure.
    async fn execute(&self, descriptor: &OperationDescriptor) -> Result<BackendResult, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_fields_subtracts_hidden() {
        let descriptor = OperationDescriptor {
            operation: "get".to_string(),
            data_type: "Article".to_string(),
            id: None,
            filter: HashMap::new(),
            fields: vec!["id".to_string(), "name".to_string(), "password".to_string()],
            hide_fields: vec!["password".to_string()],
            page: 1,
            page_size: 100,
            sort: vec!["name".to_string(), "up".to_string()],
            is_collection: true,
        };
        assert_eq!(descriptor.visible_fields(), vec!["id", "name"]);
    }

    #[test]
    fn test_descriptor_deserializes_from_camel_case_context() {
        let descriptor: OperationDescriptor = serde_json::from_value(serde_json::json!({
            "operation": "get",
            "dataType": "Article",
            "filter": { "accessLevel": ["public"] },
            "hideFields": ["password"],
            "pageSize": 25,
            "isCollection": true
        }))
        .unwrap();
        assert_eq!(descriptor.data_type, "Article");
        assert_eq!(descriptor.page, 1);
        assert_eq!(descriptor.page_size, 25);
        assert_eq!(descriptor.hide_fields, vec!["password".to_string()]);
    }
}
