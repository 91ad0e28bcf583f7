//! Model stage: normalize request fields into an operation descriptor.
//!
//! Everything upstream of this stage deals in strings (the router performs
//! no coercion); the model turns those strings into the typed, driver-
//! agnostic [`OperationDescriptor`] the storage backends consume — paging
//! and sort defaults filled in, the access filter folded into the query,
//! and the `filter`+`id` route shapes collapsed the same way the document
//! engine always has.
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{
    core::{
        context::Context,
        envelope::{Envelope, Reply},
        pipeline::{RequestMeta, Stage, StageError},
    },
    ports::storage::OperationDescriptor,
    stages::not_allowed,
};

const OPERATIONS: &[&str] = &["get"];

/// Defaults applied when the request does not specify a field.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub driver: String,
    pub page: u64,
    pub page_size: u64,
    pub show: Vec<String>,
    pub hide: Vec<String>,
    pub sort: Vec<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            driver: "Json".to_string(),
            page: 1,
            page_size: 100,
            show: ["id", "name", "description", "introText", "text", "metadata", "category", "tags"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            hide: vec!["_id".to_string(), "password".to_string()],
            sort: vec!["name".to_string(), "up".to_string()],
        }
    }
}

pub struct ModelStage {
    context: Context,
    settings: ModelSettings,
}

impl ModelStage {
    pub fn new(context: Context, settings: ModelSettings) -> Self {
        Self { context, settings }
    }

    /// Coerce a string field to an integer; non-numeric input yields `None`.
    fn parse_int(value: Option<&Value>) -> Option<u64> {
        match value {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Coerce a field to a list of words: arrays pass through, strings are
    /// split on non-word characters.
    fn parse_array(value: Option<&Value>) -> Option<Vec<String>> {
        match value {
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            ),
            Some(Value::String(s)) => Some(
                s.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
                    .filter(|word| !word.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Build the query map: the access filter seeds it, then the route's
    /// `filter`/`id` captures collapse onto it.
    fn build_filter(&self) -> (HashMap<String, Vec<String>>, Option<String>) {
        let mut query: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(access) = self.context.get("accessFilter").and_then(Value::as_object) {
            for (field, accepted) in access {
                if let Some(values) = Self::parse_array(Some(accepted)) {
                    query.insert(field.clone(), values);
                }
            }
        }

        let mut id = self.context.get_str("id").map(str::to_string);
        if let (Some(filter), Some(filter_id)) = (self.context.get_str("filter"), id.clone()) {
            // `/{dataType}/{filter}/{id}` shapes: the id constrains the
            // filtered field, not the primary key.
            let entry = query.entry(filter.to_string()).or_default();
            if entry.is_empty() {
                entry.push(filter_id.clone());
            } else if entry.contains(&filter_id) {
                *entry = vec![filter_id.clone()];
            } else {
                entry.clear();
            }
            id = None;
        }
        if let Some(ref key) = id {
            query.insert("id".to_string(), vec![key.clone()]);
        }
        (query, id)
    }

    fn prepare(&self) -> Result<OperationDescriptor, Envelope> {
        let data_type = self
            .context
            .get_str("dataType")
            .map(str::to_string)
            .ok_or_else(|| {
                Envelope::respond(Reply::BadRequest)
                    .with_message("model cannot determine data type")
            })?;
        let (filter, id) = self.build_filter();
        Ok(OperationDescriptor {
            operation: "get".to_string(),
            data_type,
            is_collection: id.is_none(),
            id,
            filter,
            fields: Self::parse_array(self.context.get("show"))
                .unwrap_or_else(|| self.settings.show.clone()),
            hide_fields: Self::parse_array(self.context.get("hide"))
                .unwrap_or_else(|| self.settings.hide.clone()),
            page: Self::parse_int(self.context.get("page")).unwrap_or(self.settings.page),
            page_size: Self::parse_int(self.context.get("pageSize"))
                .unwrap_or(self.settings.page_size),
            sort: Self::parse_array(self.context.get("sort"))
                .unwrap_or_else(|| self.settings.sort.clone()),
        })
    }
}

#[async_trait]
impl Stage for ModelStage {
    fn name(&self) -> &'static str {
        "Model"
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    async fn handle(&mut self, _request: &RequestMeta) -> Result<Envelope, StageError> {
        let method = self.context.get_str("method").unwrap_or_default();
        // HEAD rides the same descriptor as GET; the transport drops the body.
        if method != "get" && method != "head" {
            tracing::warn!(%method, "model fails to invoke method");
            return Ok(not_allowed(OPERATIONS));
        }
        let descriptor = match self.prepare() {
            Ok(descriptor) => descriptor,
            Err(envelope) => return Ok(envelope),
        };
        tracing::debug!(data_type = %descriptor.data_type, "model prepared operation");

        let driver = self
            .context
            .get_str("driver")
            .unwrap_or(self.settings.driver.as_str())
            .to_string();
        let mut data = match serde_json::to_value(&descriptor) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        data.insert("driver".to_string(), Value::String(driver));
        Ok(Envelope::success(Value::Object(data)))
    }
}
