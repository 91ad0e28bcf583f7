//! Application root stage.
//!
//! The entry point of every request: contributes no data of its own, only
//! the configured stage stack. The default stack is the canonical
//! routing → session → access-control → data-model → storage-driver chain.
use async_trait::async_trait;

use crate::core::{
    context::Context,
    envelope::Envelope,
    pipeline::{RequestMeta, Stage, StageError},
};

/// The stack used when configuration does not override it.
pub fn default_stack() -> Vec<String> {
    ["Router", "Session", "Access", "Controller", "Model", "Driver"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub struct ApplicationStage {
    context: Context,
    stack: Vec<String>,
}

impl ApplicationStage {
    pub fn new(context: Context, stack: Vec<String>) -> Self {
        Self { context, stack }
    }
}

#[async_trait]
impl Stage for ApplicationStage {
    fn name(&self) -> &'static str {
        "Application"
    }

    fn stack(&self) -> Vec<String> {
        self.stack.clone()
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    async fn handle(&mut self, _request: &RequestMeta) -> Result<Envelope, StageError> {
        Ok(Envelope::success(serde_json::json!({})))
    }
}
