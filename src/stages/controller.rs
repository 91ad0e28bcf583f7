//! Controller stage: HTTP-verb dispatch and request gating.
use async_trait::async_trait;
use serde_json::json;

use crate::core::{
    context::Context,
    envelope::{Envelope, Reply},
    pipeline::{RequestMeta, Stage, StageError},
};
use crate::stages::not_allowed;

/// Operations this controller accepts, keyed by lowercased HTTP verb.
const OPERATIONS: &[&str] = &["get", "head"];

/// Validates the routed method against the operation table before the data
/// model runs. An unsupported verb rejects with `notAllowed`, the `Allow`
/// header enumerating the supported table. Supported verbs verify the
/// request names a data type and let the chain continue.
pub struct ControllerStage {
    context: Context,
}

impl ControllerStage {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    fn read(&self) -> Envelope {
        if self.context.get_str("dataType").is_none() {
            return Envelope::respond(Reply::BadRequest)
                .with_message("controller cannot determine data type");
        }
        Envelope::success(json!({}))
    }
}

#[async_trait]
impl Stage for ControllerStage {
    fn name(&self) -> &'static str {
        "Controller"
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    async fn handle(&mut self, _request: &RequestMeta) -> Result<Envelope, StageError> {
        let Some(method) = self.context.get_str("method").map(str::to_string) else {
            tracing::warn!("controller cannot determine method");
            return Ok(not_allowed(OPERATIONS));
        };
        match method.as_str() {
            "get" | "head" => {
                tracing::debug!(%method, "controller invokes method");
                Ok(self.read())
            }
            _ => {
                tracing::warn!(%method, "controller fails to invoke method");
                Ok(not_allowed(OPERATIONS))
            }
        }
    }
}
