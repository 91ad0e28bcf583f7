//! Stage contract and sequential pipeline executor.
//!
//! A [`Stage`] is any pipeline participant: it owns a per-request [`Context`],
//! produces an [`Envelope`] from `handle`, and may declare an ordered stack
//! of successor module names. The [`Pipeline`] drives the chain: merge the
//! caller's context, run `handle`, short-circuit on non-success, merge the
//! success data, then resolve/construct/invoke each successor strictly in
//! order — left-to-right, depth-first, exactly one active stage at a time
//! per request.
use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::core::{
    context::Context,
    envelope::Envelope,
    registry::ModuleRegistry,
};

/// Error type for pipeline execution. These are internal faults, distinct
/// from the fail/error envelopes stages return as values; the pipeline
/// boundary normalizes them into `error` envelopes before the transport
/// layer ever sees them.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StageError {
    /// A stack entry names a module the registry cannot resolve.
    #[error("stage stack references unknown module '{0}'")]
    Configuration(String),
    /// A stage hit an unrecoverable internal fault.
    #[error("stage '{stage}' failed: {message}")]
    Internal { stage: &'static str, message: String },
}

/// Transport-agnostic request metadata handed to every stage.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    /// HTTP method, as received (e.g. `GET`).
    pub method: String,
    /// Request target: path plus optional query string.
    pub target: String,
    pub content_type: Option<String>,
    /// Parsed request cookies.
    pub cookies: HashMap<String, String>,
    /// Raw request body, if any.
    pub payload: Option<String>,
}

impl RequestMeta {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn with_payload(
        mut self,
        content_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        self.content_type = Some(content_type.into());
        self.payload = Some(payload.into());
        self
    }
}

/// The single capability interface every pipeline participant implements.
#[async_trait]
pub trait Stage: Send {
    /// Public module name, as bound in the registry.
    fn name(&self) -> &'static str;

    /// Ordered successor module names. Order defines dependency: a stage
    /// fully resolves before the next entry runs.
    fn stack(&self) -> Vec<String> {
        Vec::new()
    }

    fn context(&self) -> &Context;

    fn context_mut(&mut self) -> &mut Context;

    /// Produce this stage's result. Every implementation returns an
    /// [`Envelope`] — never a bare data object — so the merge contract has
    /// exactly one shape.
    async fn handle(&mut self, request: &RequestMeta) -> Result<Envelope, StageError>;
}

/// Final result of a pipeline run: the terminal envelope plus the root
/// stage's accumulated context (the transport layer reads session identity
/// and content negotiation hints from it).
#[derive(Debug)]
pub struct PipelineOutcome {
    pub envelope: Envelope,
    pub context: Context,
}

/// Sequential chain-of-responsibility executor over registry-resolved stages.
pub struct Pipeline {
    registry: Arc<ModuleRegistry>,
}

impl Pipeline {
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Run a full request through the chain rooted at `root`. Internal
    /// faults are normalized into `error` envelopes here; no raw error ever
    /// crosses this boundary.
    pub async fn run(&self, root: &str, request: &RequestMeta) -> PipelineOutcome {
        let factory = match self.registry.resolve(root).await {
            Ok(factory) => factory,
            Err(error) => {
                tracing::error!(module = root, %error, "root stage is not loaded");
                return PipelineOutcome {
                    envelope: Envelope::error("Invalid pipeline configuration"),
                    context: Context::new(),
                };
            }
        };
        let mut stage = factory(Context::new());
        let envelope = match self.invoke(stage.as_mut(), request, Context::new()).await {
            Ok(envelope) => envelope,
            Err(StageError::Configuration(name)) => {
                tracing::error!(module = %name, "stage stack references unknown module");
                Envelope::error("Invalid pipeline configuration")
            }
            Err(error @ StageError::Internal { .. }) => {
                tracing::error!(%error, "pipeline stage failed");
                Envelope::error("Processing error")
            }
        };
        PipelineOutcome {
            envelope,
            context: std::mem::take(stage.context_mut()),
        }
    }

    /// Invoke one stage and its successor stack.
    ///
    /// The first non-success envelope aborts the remaining stack and is
    /// propagated unchanged — a stage never catches and continues past its
    /// own failure.
    pub fn invoke<'a>(
        &'a self,
        stage: &'a mut dyn Stage,
        request: &'a RequestMeta,
        context: Context,
    ) -> BoxFuture<'a, Result<Envelope, StageError>> {
        Box::pin(async move {
            tracing::debug!(stage = stage.name(), "invoking stage");
            stage.context_mut().merge(context);

            let mut result = stage.handle(request).await?;
            if !result.is_success() {
                tracing::debug!(
                    stage = stage.name(),
                    status_code = result.status_code,
                    "stage short-circuits the chain"
                );
                return Ok(result);
            }
            if let Some(data) = result.data_object() {
                stage.context_mut().merge_object(data);
            }

            for successor in stage.stack() {
                let factory = self
                    .registry
                    .resolve(&successor)
                    .await
                    .map_err(|_| StageError::Configuration(successor.clone()))?;
                // The successor's own section is consumed here so it does not
                // leak to the stages after it.
                let section = stage.context_mut().take_section(&successor.to_lowercase());
                let mut instance = factory(section);
                let outcome = self
                    .invoke(instance.as_mut(), request, stage.context().clone())
                    .await?;
                if !outcome.is_success() {
                    return Ok(outcome);
                }
                if let Some(data) = outcome.data_object() {
                    stage.context_mut().merge_object(data);
                }
                result = outcome;
            }
            Ok(result)
        })
    }
}
