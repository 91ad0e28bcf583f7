//! Driver stage: hand the prepared operation to a storage driver.
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    core::{
        context::Context,
        envelope::{Envelope, Reply},
        pipeline::{RequestMeta, Stage, StageError},
        registry::ModuleRegistry,
    },
    ports::storage::{BackendError, OperationDescriptor, StorageBackend},
    stages::not_allowed,
};

const OPERATIONS: &[&str] = &["get"];

/// Indirection stage between the model and the concrete storage drivers.
///
/// The context's `driver` field (e.g. `Json`) selects the registry module
/// `{driver}Driver`; that module is constructed with the full context and
/// invoked in place. A driver name the registry cannot resolve is a
/// deployment fault, not a client error.
///
/// Holds the registry weakly: the registry owns the factory that builds this
/// stage, so a strong handle here would cycle.
pub struct DriverStage {
    context: Context,
    registry: Weak<ModuleRegistry>,
}

impl DriverStage {
    pub fn new(context: Context, registry: Weak<ModuleRegistry>) -> Self {
        Self { context, registry }
    }
}

#[async_trait]
impl Stage for DriverStage {
    fn name(&self) -> &'static str {
        "Driver"
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    async fn handle(&mut self, request: &RequestMeta) -> Result<Envelope, StageError> {
        let Some(driver) = self.context.get_str("driver") else {
            tracing::warn!("driver stage cannot determine driver");
            return Ok(
                Envelope::respond(Reply::BadRequest).with_message("driver cannot be determined")
            );
        };
        let module = format!("{driver}Driver");
        let registry = self.registry.upgrade().ok_or(StageError::Internal {
            stage: "Driver",
            message: "module registry was dropped".to_string(),
        })?;
        let factory = registry
            .resolve(&module)
            .await
            .map_err(|_| StageError::Configuration(module.clone()))?;
        tracing::debug!(%module, "driver stage delegates operation");
        let mut instance = factory(self.context.clone());
        instance.handle(request).await
    }
}

/// Adapter from the stage contract onto a [`StorageBackend`]: deserializes
/// the operation descriptor out of its context, executes it, and renders the
/// backend's result or error as an envelope.
pub struct BackendDriverStage {
    name: &'static str,
    context: Context,
    backend: Arc<dyn StorageBackend>,
}

impl BackendDriverStage {
    pub fn new(name: &'static str, context: Context, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            name,
            context,
            backend,
        }
    }
}

#[async_trait]
impl Stage for BackendDriverStage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    async fn handle(&mut self, _request: &RequestMeta) -> Result<Envelope, StageError> {
        let Some("get") = self.context.get_str("operation") else {
            let operation = self.context.get_str("operation").unwrap_or("none");
            tracing::warn!(%operation, "driver fails to invoke operation");
            return Ok(not_allowed(OPERATIONS));
        };
        let descriptor: OperationDescriptor =
            match serde_json::from_value(self.context.clone().into_value()) {
                Ok(descriptor) => descriptor,
                Err(error) => {
                    tracing::warn!(%error, "driver received a malformed operation");
                    return Ok(Envelope::respond(Reply::BadRequest)
                        .with_message("malformed operation descriptor"));
                }
            };

        match self.backend.execute(&descriptor).await {
            Ok(result) => {
                let data = serde_json::to_value(&result).unwrap_or(Value::Null);
                Ok(Envelope::success(data))
            }
            Err(BackendError::NotFound) => Ok(Envelope::respond(Reply::NotFound)),
            Err(BackendError::BadRequest(message)) => {
                Ok(Envelope::respond(Reply::BadRequest).with_message(message))
            }
            Err(BackendError::Unavailable(detail)) => {
                // The transport never sees backend internals.
                tracing::error!(driver = self.name, %detail, "storage backend unavailable");
                Ok(Envelope::error("Storage error"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        core::registry::Catalog,
        ports::storage::BackendResult,
    };

    struct ScriptedBackend {
        reply: Result<BackendResult, BackendError>,
    }

    #[async_trait]
    impl StorageBackend for ScriptedBackend {
        async fn execute(
            &self,
            _descriptor: &OperationDescriptor,
        ) -> Result<BackendResult, BackendError> {
            match &self.reply {
                Ok(result) => Ok(result.clone()),
                Err(BackendError::NotFound) => Err(BackendError::NotFound),
                Err(BackendError::BadRequest(m)) => Err(BackendError::BadRequest(m.clone())),
                Err(BackendError::Unavailable(m)) => Err(BackendError::Unavailable(m.clone())),
            }
        }
    }

    fn backend_stage(
        fields: Value,
        reply: Result<BackendResult, BackendError>,
    ) -> BackendDriverStage {
        BackendDriverStage::new(
            "JsonDriver",
            Context::from_value(fields),
            Arc::new(ScriptedBackend { reply }),
        )
    }

    fn get_operation() -> Value {
        json!({ "operation": "get", "dataType": "Article" })
    }

    #[tokio::test]
    async fn test_backend_item_renders_as_success() {
        let mut stage = backend_stage(
            get_operation(),
            Ok(BackendResult::item(json!({ "id": "42" }))),
        );
        let envelope = stage.handle(&RequestMeta::new("GET", "/")).await.unwrap();
        assert!(envelope.is_success());
        assert_eq!(
            envelope.data_object().unwrap().get("data"),
            Some(&json!({ "id": "42" }))
        );
    }

    #[tokio::test]
    async fn test_backend_not_found_is_404() {
        let mut stage = backend_stage(get_operation(), Err(BackendError::NotFound));
        let envelope = stage.handle(&RequestMeta::new("GET", "/")).await.unwrap();
        assert_eq!(envelope.status_code, 404);
    }

    #[tokio::test]
    async fn test_backend_failure_is_opaque_500() {
        let mut stage = backend_stage(
            get_operation(),
            Err(BackendError::Unavailable("disk on fire".to_string())),
        );
        let envelope = stage.handle(&RequestMeta::new("GET", "/")).await.unwrap();
        assert_eq!(envelope.status_code, 500);
        assert_eq!(envelope.message, "Storage error");
    }

    #[tokio::test]
    async fn test_unsupported_operation_is_not_allowed() {
        let mut stage = backend_stage(
            json!({ "operation": "delete", "dataType": "Article" }),
            Ok(BackendResult::item(json!({}))),
        );
        let envelope = stage.handle(&RequestMeta::new("GET", "/")).await.unwrap();
        assert_eq!(envelope.status_code, 405);
    }

    #[tokio::test]
    async fn test_unknown_driver_is_a_configuration_error() {
        let registry = Arc::new(ModuleRegistry::new(Catalog::new(), vec!["json".to_string()]));
        let mut stage = DriverStage::new(
            Context::from_value(json!({ "driver": "Phantom" })),
            Arc::downgrade(&registry),
        );
        let result = stage.handle(&RequestMeta::new("GET", "/")).await;
        assert!(matches!(result, Err(StageError::Configuration(name)) if name == "PhantomDriver"));
    }

    #[tokio::test]
    async fn test_driver_delegates_to_named_module() {
        let mut catalog = Catalog::new();
        let backend: Arc<dyn StorageBackend> = Arc::new(ScriptedBackend {
            reply: Ok(BackendResult::item(json!({ "id": "home" }))),
        });
        catalog.provide("JsonDriver", move |context| {
            Box::new(BackendDriverStage::new("JsonDriver", context, backend.clone()))
                as Box<dyn Stage>
        });
        let registry = Arc::new(ModuleRegistry::new(catalog, vec!["json".to_string()]));
        registry.adopt_catalog();
        registry.load_all().await;

        let mut stage = DriverStage::new(
            Context::from_value(json!({
                "driver": "Json",
                "operation": "get",
                "dataType": "Article",
            })),
            Arc::downgrade(&registry),
        );
        let envelope = stage.handle(&RequestMeta::new("GET", "/")).await.unwrap();
        assert!(envelope.is_success());
    }
}
