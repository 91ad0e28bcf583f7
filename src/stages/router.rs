//! Router stage: URL → structured context fields.
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use url::Url;

use crate::core::{
    context::Context,
    envelope::{Envelope, Reply},
    pipeline::{RequestMeta, Stage, StageError},
    router::{RouteMatch, RouteTable},
};

/// Parses `METHOD /path?query` against the configured route table and merges
/// the outcome into the request context: query fields and payload first,
/// then the lowercased method and session cookie, then the matched
/// template's captures and presets (presets win). Values pass through as
/// strings — type coercion is the Model stage's job.
pub struct RouterStage {
    context: Context,
    table: Arc<RouteTable>,
}

impl RouterStage {
    pub fn new(context: Context, table: Arc<RouteTable>) -> Self {
        Self { context, table }
    }

    fn parse_payload(request: &RequestMeta) -> Option<Value> {
        let payload = request.payload.as_deref()?;
        match request.content_type.as_deref() {
            Some("application/json") => serde_json::from_str(payload).ok(),
            Some("application/x-www-form-urlencoded") => {
                let mut fields = Map::new();
                for (name, value) in url::form_urlencoded::parse(payload.as_bytes()) {
                    fields.insert(name.into_owned(), Value::String(value.into_owned()));
                }
                Some(Value::Object(fields))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl Stage for RouterStage {
    fn name(&self) -> &'static str {
        "Router"
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    async fn handle(&mut self, request: &RequestMeta) -> Result<Envelope, StageError> {
        tracing::info!(
            method = %request.method,
            target = %request.target,
            "router parses request"
        );
        let url = match Url::parse("http://localhost").and_then(|base| base.join(&request.target)) {
            Ok(url) => url,
            Err(_) => {
                return Ok(
                    Envelope::respond(Reply::BadRequest).with_message("malformed request target")
                );
            }
        };

        let mut data = Map::new();
        if let Some(payload) = Self::parse_payload(request) {
            data.insert("payload".to_string(), payload);
        }
        // Query parameters pass through untyped.
        for (name, value) in url.query_pairs() {
            data.insert(name.into_owned(), Value::String(value.into_owned()));
        }

        let method = request.method.to_uppercase();
        match self.table.lookup(&method, url.path()) {
            RouteMatch::Matched(matched) => {
                data.insert(
                    "method".to_string(),
                    Value::String(request.method.to_lowercase()),
                );
                if let Some(session_id) = request.cookies.get("sessionId") {
                    data.insert(
                        "sessionId".to_string(),
                        Value::String(session_id.clone()),
                    );
                }
                for (key, value) in matched {
                    data.insert(key, value);
                }
                tracing::debug!(?data, "router returns results");
                Ok(Envelope::success(Value::Object(data)))
            }
            RouteMatch::Skipped | RouteMatch::NoMatch => Ok(Envelope::respond(Reply::NotFound)
                .with_message("router ignores this route")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn table() -> Arc<RouteTable> {
        let preset = |v: Value| v.as_object().cloned().unwrap_or_default();
        Arc::new(
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
            ])
            .unwrap(),
        )
    }

    async fn route(request: RequestMeta) -> Envelope {
        let mut stage = RouterStage::new(Context::new(), table());
        stage.handle(&request).await.unwrap()
    }

    #[tokio::test]
    async fn test_parses_captures_and_query_as_strings() {
        let envelope = route(RequestMeta::new("GET", "/Article/42?page=2")).await;
        assert!(envelope.is_success());
        let data = envelope.data_object().unwrap();
        assert_eq!(data.get("dataType"), Some(&json!("Article")));
        assert_eq!(data.get("id"), Some(&json!("42")));
        assert_eq!(data.get("page"), Some(&json!("2")));
        assert_eq!(data.get("method"), Some(&json!("get")));
    }

    #[tokio::test]
    async fn test_session_cookie_flows_into_context() {
        let envelope =
            route(RequestMeta::new("GET", "/Article").with_cookie("sessionId", "abc123")).await;
        assert_eq!(
            envelope.data_object().unwrap().get("sessionId"),
            Some(&json!("abc123"))
        );
    }

    #[tokio::test]
    async fn test_skip_route_is_not_found() {
        let envelope = route(RequestMeta::new("GET", "/favicon.ico")).await;
        assert_eq!(envelope.status_code, 404);
    }

    #[tokio::test]
    async fn test_unmatched_route_is_not_found() {
        let envelope = route(RequestMeta::new("DELETE", "/Article")).await;
        assert_eq!(envelope.status_code, 404);
    }

    #[tokio::test]
    async fn test_json_payload_is_parsed() {
        let request = RequestMeta::new("GET", "/Article")
            .with_payload("application/json", r#"{ "name": "intro" }"#);
        let envelope = route(request).await;
        assert_eq!(
            envelope.data_object().unwrap().get("payload"),
            Some(&json!({ "name": "intro" }))
        );
    }

    #[tokio::test]
    async fn test_form_payload_is_parsed() {
        let request = RequestMeta::new("GET", "/Article")
            .with_payload("application/x-www-form-urlencoded", "user=jane&role=editor");
        let envelope = route(request).await;
        assert_eq!(
            envelope.data_object().unwrap().get("payload"),
            Some(&json!({ "user": "jane", "role": "editor" }))
        );
    }
}
