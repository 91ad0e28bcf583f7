//! Engine assembly: configuration in, request pipeline out.
//!
//! Everything a request needs is constructed here once and injected into the
//! stage factories: the route table, the session store, the storage backend,
//! and the registry the pipeline resolves stages from. Nothing reaches for
//! ambient globals at request time.
use std::{
    path::Path,
    sync::{Arc, Weak},
};

use eyre::{Result, eyre};

use crate::{
    adapters::json_backend::JsonBackend,
    config::models::EngineConfig,
    core::{
        pipeline::{Pipeline, PipelineOutcome, RequestMeta, Stage},
        registry::{Catalog, ModuleRegistry},
        router::RouteTable,
        session::SessionStore,
    },
    ports::storage::StorageBackend,
    stages::{
        AccessStage, ApplicationStage, BackendDriverStage, ControllerStage, DriverStage,
        ModelSettings, ModelStage, RouterStage, SessionStage,
    },
};

/// The name of the pipeline root stage every request enters through.
pub const ROOT_MODULE: &str = "Application";

/// Stage modules the stock catalog provides. A configured stack can only
/// resolve against these names; the validator rejects anything else before
/// the engine is built.
pub const STOCK_MODULES: &[&str] = &[
    ROOT_MODULE,
    "Router",
    "Session",
    "Access",
    "Controller",
    "Model",
    "Driver",
    "JsonDriver",
];

/// A fully wired request-processing engine.
pub struct Engine {
    registry: Arc<ModuleRegistry>,
    pipeline: Pipeline,
    sessions: Arc<SessionStore>,
}

impl Engine {
    /// Build and load the engine from configuration. Fails when the
    /// configuration cannot be realized (bad route templates, bad durations,
    /// unreadable module root, or a root stage that did not load).
    pub async fn from_config(config: &EngineConfig) -> Result<Self> {
        let sessions = SessionStore::new(config.session.to_settings()?);
        let routes = Arc::new(RouteTable::parse(&config.route_pairs())?);
        let backend: Arc<dyn StorageBackend> =
            Arc::new(JsonBackend::new(&config.data.documents_root));
        let model_settings = ModelSettings {
            driver: config.data.driver.clone(),
            ..ModelSettings::default()
        };
        let stack = config.stack.clone();

        // The Driver factory needs a handle back to the registry that owns
        // it, hence the cyclic construction with a weak reference.
        let registry = Arc::new_cyclic(|registry: &Weak<ModuleRegistry>| {
            let catalog = build_catalog(CatalogParts {
                stack,
                routes,
                sessions: sessions.clone(),
                model_settings,
                backend,
                registry: registry.clone(),
            });
            ModuleRegistry::new(catalog, config.modules.extensions.clone())
        });

        match &config.modules.root {
            Some(root) => {
                registry.register(Path::new(root))?;
            }
            None => {
                registry.adopt_catalog();
            }
        }
        registry.load_all().await;

        if !registry.exists(ROOT_MODULE).await {
            return Err(eyre!(
                "root module '{ROOT_MODULE}' did not load; check the module root"
            ));
        }

        Ok(Self {
            pipeline: Pipeline::new(registry.clone()),
            registry,
            sessions,
        })
    }

    /// Run one request through the full stage chain.
    pub async fn handle(&self, request: &RequestMeta) -> PipelineOutcome {
        self.pipeline.run(ROOT_MODULE, request).await
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }
}

struct CatalogParts {
    stack: Vec<String>,
    routes: Arc<RouteTable>,
    sessions: Arc<SessionStore>,
    model_settings: ModelSettings,
    backend: Arc<dyn StorageBackend>,
    registry: Weak<ModuleRegistry>,
}

fn build_catalog(parts: CatalogParts) -> Catalog {
    let CatalogParts {
        stack,
        routes,
        sessions,
        model_settings,
        backend,
        registry,
    } = parts;

    let mut catalog = Catalog::new();
    catalog.provide(ROOT_MODULE, move |context| {
        Box::new(ApplicationStage::new(context, stack.clone())) as Box<dyn Stage>
    });
    catalog.provide("Router", move |context| {
        Box::new(RouterStage::new(context, routes.clone())) as Box<dyn Stage>
    });
    catalog.provide("Session", move |context| {
        Box::new(SessionStage::new(context, sessions.clone())) as Box<dyn Stage>
    });
    catalog.provide("Access", |context| {
        Box::new(AccessStage::new(context)) as Box<dyn Stage>
    });
    catalog.provide("Controller", |context| {
        Box::new(ControllerStage::new(context)) as Box<dyn Stage>
    });
    catalog.provide("Model", move |context| {
        Box::new(ModelStage::new(context, model_settings.clone())) as Box<dyn Stage>
    });
    catalog.provide("Driver", move |context| {
        Box::new(DriverStage::new(context, registry.clone())) as Box<dyn Stage>
    });
    catalog.provide("JsonDriver", move |context| {
        Box::new(BackendDriverStage::new("JsonDriver", context, backend.clone()))
            as Box<dyn Stage>
    });
    catalog
}
