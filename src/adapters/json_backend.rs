//! JSON file storage backend.
//!
//! One store file per data type: `{documents_root}/{dataType}.json`, holding
//! a flat array of document objects. The whole store is read per operation;
//! this backend targets small document sets where simplicity beats caching.
use std::{cmp::Ordering, path::PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::ports::storage::{BackendError, BackendResult, OperationDescriptor, StorageBackend};

pub struct JsonBackend {
    documents_root: PathBuf,
}

impl JsonBackend {
    pub fn new(documents_root: impl Into<PathBuf>) -> Self {
        Self {
            documents_root: documents_root.into(),
        }
    }

    /// The data type names the store file, so it must never traverse paths.
    fn store_path(&self, data_type: &str) -> Result<PathBuf, BackendError> {
        if data_type.is_empty() || !data_type.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(BackendError::BadRequest(format!(
                "invalid data type '{data_type}'"
            )));
        }
        Ok(self.documents_root.join(format!("{data_type}.json")))
    }

    async fn load_store(&self, data_type: &str) -> Result<Vec<Value>, BackendError> {
        let path = self.store_path(data_type)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BackendError::NotFound);
            }
            Err(e) => {
                return Err(BackendError::Unavailable(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(Value::Array(documents)) => Ok(documents),
            Ok(_) => Err(BackendError::Unavailable(format!(
                "{} does not hold a document array",
                path.display()
            ))),
            Err(e) => Err(BackendError::Unavailable(format!(
                "{} is not valid JSON: {e}",
                path.display()
            ))),
        }
    }

    /// A document matches when every filtered field it carries holds one of
    /// the accepted values. Documents lacking a filtered field pass.
    fn matches(document: &Value, descriptor: &OperationDescriptor) -> bool {
        let Some(fields) = document.as_object() else {
            return false;
        };
        descriptor.filter.iter().all(|(field, accepted)| {
            match fields.get(field) {
                None => true,
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|item| accepted.iter().any(|a| value_eq(item, a))),
                Some(value) => accepted.iter().any(|a| value_eq(value, a)),
            }
        })
    }

    fn project(document: &Value, descriptor: &OperationDescriptor) -> Value {
        let Some(fields) = document.as_object() else {
            return document.clone();
        };
        let visible = descriptor.visible_fields();
        let mut projected = Map::new();
        for (name, value) in fields {
            let hidden = descriptor.hide_fields.iter().any(|h| h == name);
            let shown = descriptor.fields.is_empty() || visible.contains(&name.as_str());
            if shown && !hidden {
                projected.insert(name.clone(), value.clone());
            }
        }
        Value::Object(projected)
    }

    fn sort(documents: &mut [Value], descriptor: &OperationDescriptor) {
        let field = descriptor
            .sort
            .first()
            .map(String::as_str)
            .unwrap_or("id")
            .to_string();
        documents.sort_by(|a, b| compare_field(a, b, &field));
        if descriptor.sort.get(1).map(String::as_str) == Some("down") {
            documents.reverse();
        }
    }
}

fn value_eq(value: &Value, accepted: &str) -> bool {
    match value {
        Value::String(s) => s == accepted,
        Value::Number(n) => n.to_string() == accepted,
        Value::Bool(b) => b.to_string() == accepted,
        _ => false,
    }
}

fn compare_field(a: &Value, b: &Value, field: &str) -> Ordering {
    let (a, b) = (a.get(field), b.get(field));
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
        // Documents missing the sort field order last.
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl StorageBackend for JsonBackend {
    async fn execute(&self, descriptor: &OperationDescriptor) -> Result<BackendResult, BackendError> {
        if descriptor.page == 0 || descriptor.page_size == 0 {
            return Err(BackendError::BadRequest(
                "page and pageSize must be at least 1".to_string(),
            ));
        }
        let documents = self.load_store(&descriptor.data_type).await?;
        let mut matched: Vec<Value> = documents
            .iter()
            .filter(|document| Self::matches(document, descriptor))
            .cloned()
            .collect();
        Self::sort(&mut matched, descriptor);

        if !descriptor.is_collection {
            // The id constraint is already part of the filter; a single-item
            // get is just "first match or nothing".
            return match matched.first() {
                Some(document) => Ok(BackendResult::item(Self::project(document, descriptor))),
                None => Err(BackendError::NotFound),
            };
        }

        let total_size = matched.len() as u64;
        // Client-controlled paging must not overflow; a page past the end is
        // simply empty.
        let start = usize::try_from((descriptor.page - 1).saturating_mul(descriptor.page_size))
            .unwrap_or(usize::MAX);
        let page: Vec<Value> = matched
            .iter()
            .skip(start)
            .take(descriptor.page_size as usize)
            .map(|document| Self::project(document, descriptor))
            .collect();
        tracing::debug!(
            data_type = %descriptor.data_type,
            total = total_size,
            page = descriptor.page,
            "json store query"
        );
        Ok(BackendResult::collection(
            page,
            descriptor.page,
            descriptor.page_size,
            total_size,
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn seed_store(root: &TempDir) {
        let documents = json!([
            { "id": "intro", "name": "Charlie", "accessLevel": "public", "password": "x" },
            { "id": "news", "name": "Alpha", "accessLevel": "private" },
            { "id": "about", "name": "Bravo", "accessLevel": "public" },
        ]);
        std::fs::write(
            root.path().join("Article.json"),
            serde_json::to_vec(&documents).unwrap(),
        )
        .unwrap();
    }

    fn descriptor() -> OperationDescriptor {
        serde_json::from_value(json!({
            "operation": "get",
            "dataType": "Article",
            "isCollection": true,
            "hideFields": ["password"],
            "sort": ["name", "up"],
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_collection_is_filtered_sorted_and_projected() {
        let root = TempDir::new().unwrap();
        seed_store(&root);
        let backend = JsonBackend::new(root.path());

        let mut descriptor = descriptor();
        descriptor
            .filter
            .insert("accessLevel".to_string(), vec!["public".to_string()]);

        let result = backend.execute(&descriptor).await.unwrap();
        let names: Vec<&str> = result
            .data
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Bravo", "Charlie"]);
        assert_eq!(result.total_size, Some(2));
        assert!(result.data[1].get("password").is_none());
    }

    #[tokio::test]
    async fn test_descending_sort() {
        let root = TempDir::new().unwrap();
        seed_store(&root);
        let backend = JsonBackend::new(root.path());

        let mut descriptor = descriptor();
        descriptor.sort = vec!["name".to_string(), "down".to_string()];

        let result = backend.execute(&descriptor).await.unwrap();
        let first = result.data[0]["name"].as_str().unwrap();
        assert_eq!(first, "Charlie");
    }

    #[tokio::test]
    async fn test_single_item_by_id() {
        let root = TempDir::new().unwrap();
        seed_store(&root);
        let backend = JsonBackend::new(root.path());

        let mut descriptor = descriptor();
        descriptor.is_collection = false;
        descriptor.id = Some("news".to_string());
        descriptor
            .filter
            .insert("id".to_string(), vec!["news".to_string()]);

        let result = backend.execute(&descriptor).await.unwrap();
        assert_eq!(result.data["name"], json!("Alpha"));
        assert_eq!(result.size, None);
    }

    #[tokio::test]
    async fn test_missing_item_is_not_found() {
        let root = TempDir::new().unwrap();
        seed_store(&root);
        let backend = JsonBackend::new(root.path());

        let mut descriptor = descriptor();
        descriptor.is_collection = false;
        descriptor
            .filter
            .insert("id".to_string(), vec!["phantom".to_string()]);

        assert!(matches!(
            backend.execute(&descriptor).await,
            Err(BackendError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_missing_store_is_not_found() {
        let root = TempDir::new().unwrap();
        let backend = JsonBackend::new(root.path());
        assert!(matches!(
            backend.execute(&descriptor()).await,
            Err(BackendError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_path_traversal_is_rejected() {
        let root = TempDir::new().unwrap();
        let backend = JsonBackend::new(root.path());
        let mut descriptor = descriptor();
        descriptor.data_type = "../etc/passwd".to_string();
        assert!(matches!(
            backend.execute(&descriptor).await,
            Err(BackendError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_pagination_slices_and_reports_totals() {
        let root = TempDir::new().unwrap();
        seed_store(&root);
        let backend = JsonBackend::new(root.path());

        let mut descriptor = descriptor();
        descriptor.page = 2;
        descriptor.page_size = 2;

        let result = backend.execute(&descriptor).await.unwrap();
        assert_eq!(result.size, Some(1));
        assert_eq!(result.page, Some(2));
        assert_eq!(result.total_size, Some(3));
    }

    #[tokio::test]
    async fn test_page_past_the_end_is_empty() {
        let root = TempDir::new().unwrap();
        seed_store(&root);
        let backend = JsonBackend::new(root.path());

        let mut descriptor = descriptor();
        descriptor.page = u64::MAX;
        descriptor.page_size = 100;

        let result = backend.execute(&descriptor).await.unwrap();
        assert_eq!(result.size, Some(0));
        assert_eq!(result.total_size, Some(3));
    }

    #[tokio::test]
    async fn test_corrupt_store_is_unavailable() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("Article.json"), b"not json").unwrap();
        let backend = JsonBackend::new(root.path());
        assert!(matches!(
            backend.execute(&descriptor()).await,
            Err(BackendError::Unavailable(_))
        ));
    }
}
