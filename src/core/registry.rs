//! Dynamic module registry.
//!
//! The registry is the single resolution point for every string-valued
//! type/driver field in the engine. It separates three concerns:
//!
//! * a [`Catalog`] of constructor-producing closures, populated once at
//!   startup — the explicit factory abstraction that stands in for run-time
//!   class lookup;
//! * on-disk discovery (`register`): a recursive walk of a module root where
//!   every allow-listed file becomes a [`ModuleRecord`] and the immediate
//!   parent directory names a load-order dependency;
//! * lazy, concurrency-safe loading (`load_all` / `load_module`): each record
//!   is imported exactly once behind a single-shot gate, dependencies first;
//!   a failed import is recorded and never retried, without aborting sibling
//!   loads.
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use futures_util::future::{BoxFuture, join_all};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::core::{context::Context, pipeline::Stage};

/// A constructor-producing closure: given the context section reserved for
/// the module, it yields a ready-to-invoke stage instance.
pub type StageFactory = Arc<dyn Fn(Context) -> Box<dyn Stage> + Send + Sync>;

/// Error type for registry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RegistryError {
    /// The discovery root (or a directory below it) could not be read.
    #[error("failed to scan module root {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The module failed to import (no backing implementation, or its
    /// dependency failed).
    #[error("module '{0}' failed to load")]
    LoadFailed(String),
    /// The name is not bound to a loaded implementation.
    #[error("module '{0}' is not loaded")]
    NotFound(String),
}

/// The compiled-in implementations a deployment may bind, keyed by public
/// module name. Populated at startup; immutable afterwards.
#[derive(Default)]
pub struct Catalog {
    factories: HashMap<String, StageFactory>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer an implementation under `name`.
    pub fn provide<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(Context) -> Box<dyn Stage> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    fn get(&self, name: &str) -> Option<StageFactory> {
        self.factories.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

/// Discovery/load metadata for one implementation unit.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub name: String,
    pub source: PathBuf,
    pub dependency: Option<String>,
    pub loaded: bool,
}

struct Slot {
    record: ModuleRecord,
    // Single-shot import gate: the first caller runs the import, later
    // callers await the same in-flight load. Holds the import outcome.
    gate: Arc<OnceCell<bool>>,
}

/// Diagnostic view over the registry: disjoint sets of module names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub omitted: Vec<String>,
}

/// Name → implementation registry with lazy, dependency-ordered loading.
pub struct ModuleRegistry {
    catalog: Catalog,
    extensions: Vec<String>,
    records: Mutex<HashMap<String, Arc<Slot>>>,
    bound: scc::HashMap<String, StageFactory>,
    report: Mutex<ModuleReport>,
}

impl ModuleRegistry {
    pub fn new(catalog: Catalog, extensions: Vec<String>) -> Self {
        Self {
            catalog,
            extensions,
            records: Mutex::new(HashMap::new()),
            bound: scc::HashMap::new(),
            report: Mutex::new(ModuleReport::default()),
        }
    }

    /// Recursively walk `search_root` and register every allow-listed file
    /// as a module record. A file nested one level under a directory gets
    /// that directory's name as its load dependency. Returns the number of
    /// records registered.
    pub fn register(&self, search_root: &Path) -> Result<usize, RegistryError> {
        let count = self.register_path(search_root, None)?;
        tracing::info!(
            root = %search_root.display(),
            modules = count,
            "registry completed registering modules"
        );
        Ok(count)
    }

    fn register_path(
        &self,
        search_path: &Path,
        dependency: Option<&str>,
    ) -> Result<usize, RegistryError> {
        let entries = std::fs::read_dir(search_path).map_err(|source| RegistryError::Scan {
            path: search_path.to_path_buf(),
            source,
        })?;
        let mut count = 0;
        for entry in entries {
            let entry = entry.map_err(|source| RegistryError::Scan {
                path: search_path.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                let name = entry.file_name().to_string_lossy().into_owned();
                count += self.register_path(&path, Some(&name))?;
            } else if self.allowed_extension(&path) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    self.register_module(ModuleRecord {
                        name: stem.to_string(),
                        source: path.clone(),
                        dependency: dependency.map(str::to_string),
                        loaded: false,
                    });
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    /// Register every catalog name directly, with no source file and no
    /// dependency. Used by deployments without an on-disk module layout.
    pub fn adopt_catalog(&self) -> usize {
        let names = self.catalog.names();
        for name in &names {
            self.register_module(ModuleRecord {
                name: name.clone(),
                source: PathBuf::new(),
                dependency: None,
                loaded: false,
            });
        }
        names.len()
    }

    /// Register a single record. The first registration of a name wins;
    /// later duplicates are ignored so an in-flight load gate is never
    /// replaced.
    pub fn register_module(&self, record: ModuleRecord) {
        let mut records = self.records.lock().expect("registry records lock");
        records
            .entry(record.name.clone())
            .or_insert_with(|| {
                Arc::new(Slot {
                    record,
                    gate: Arc::new(OnceCell::new()),
                })
            });
    }

    /// Load every registered module. Individual failures are recorded but do
    /// not abort unrelated loads.
    pub async fn load_all(&self) {
        let names: Vec<String> = {
            let records = self.records.lock().expect("registry records lock");
            records.keys().cloned().collect()
        };
        join_all(names.iter().map(|name| self.load_module(name))).await;

        let report = self.modules();
        tracing::info!(
            succeeded = report.succeeded.len(),
            "registry completed loading modules"
        );
        if !report.failed.is_empty() {
            tracing::warn!(failed = ?report.failed, "registry failed loading some modules");
        }
    }

    /// Load one module (and its dependency chain), importing it at most once
    /// across all concurrent callers.
    pub fn load_module<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), RegistryError>> {
        Box::pin(async move {
            let slot = {
                let records = self.records.lock().expect("registry records lock");
                records.get(name).cloned()
            };
            let Some(slot) = slot else {
                // Referenced but never registered.
                self.record_omitted(name);
                return Ok(());
            };

            let loaded = *slot
                .gate
                .get_or_init(|| self.import(slot.clone()))
                .await;
            if loaded {
                Ok(())
            } else {
                Err(RegistryError::LoadFailed(name.to_string()))
            }
        })
    }

    async fn import(&self, slot: Arc<Slot>) -> bool {
        let name = slot.record.name.clone();
        if let Some(dependency) = &slot.record.dependency {
            // A registered dependency must be bound before this module; an
            // unregistered one is recorded as omitted and skipped.
            if self.load_module(dependency).await.is_err() {
                tracing::warn!(module = %name, dependency = %dependency, "dependency failed to load");
                self.record_failure(&name);
                return false;
            }
        }
        match self.catalog.get(&name) {
            Some(factory) => {
                let _ = self.bound.insert_async(name.clone(), factory).await;
                self.record_success(&name);
                tracing::debug!(module = %name, "module loaded");
                true
            }
            None => {
                tracing::warn!(module = %name, "no implementation backs this module");
                self.record_failure(&name);
                false
            }
        }
    }

    /// True only if `name` is currently bound to a loaded implementation.
    pub async fn exists(&self, name: &str) -> bool {
        self.bound.contains_async(name).await
    }

    /// Resolve the constructor for a loaded module. Failed or unknown
    /// modules yield `NotFound`; there is no silent fallback.
    pub async fn resolve(&self, name: &str) -> Result<StageFactory, RegistryError> {
        self.bound
            .read_async(name, |_, factory| factory.clone())
            .await
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Snapshot of one record's metadata, with `loaded` reflecting the gate.
    pub fn record(&self, name: &str) -> Option<ModuleRecord> {
        let records = self.records.lock().expect("registry records lock");
        records.get(name).map(|slot| ModuleRecord {
            loaded: slot.gate.get().copied().unwrap_or(false),
            ..slot.record.clone()
        })
    }

    /// The three disjoint diagnostic sets {succeeded, failed, omitted}.
    pub fn modules(&self) -> ModuleReport {
        self.report.lock().expect("registry report lock").clone()
    }

    fn record_success(&self, name: &str) {
        let mut report = self.report.lock().expect("registry report lock");
        report.succeeded.push(name.to_string());
    }

    fn record_failure(&self, name: &str) {
        let mut report = self.report.lock().expect("registry report lock");
        report.failed.push(name.to_string());
    }

    fn record_omitted(&self, name: &str) {
        let mut report = self.report.lock().expect("registry report lock");
        if !report.omitted.iter().any(|n| n == name) {
            report.omitted.push(name.to_string());
        }
    }

    fn allowed_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|allowed| allowed == ext))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::core::{
        envelope::Envelope,
        pipeline::{RequestMeta, StageError},
    };

    struct NullStage {
        context: Context,
    }

    #[async_trait]
    impl Stage for NullStage {
        fn name(&self) -> &'static str {
            "Null"
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

    fn catalog_with(names: &[&str]) -> Catalog {
        let mut catalog = Catalog::new();
        for name in names {
            catalog.provide(*name, |context| Box::new(NullStage { context }) as Box<dyn Stage>);
        }
        catalog
    }

    fn touch(path: &Path) {
        fs::write(path, "{}").unwrap();
    }

    #[test]
    fn test_register_walks_tree_and_assigns_dependencies() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("Router.json"));
        fs::create_dir(root.path().join("Driver")).unwrap();
        touch(&root.path().join("Driver").join("JsonDriver.json"));
        touch(&root.path().join("README.md"));

        let registry = ModuleRegistry::new(catalog_with(&[]), vec!["json".to_string()]);
        let count = registry.register(root.path()).unwrap();

        assert_eq!(count, 2);
        let router = registry.record("Router").unwrap();
        assert_eq!(router.dependency, None);
        assert!(!router.loaded);
        let driver = registry.record("JsonDriver").unwrap();
        assert_eq!(driver.dependency.as_deref(), Some("Driver"));
    }

    #[test]
    fn test_register_unreadable_root_is_a_scan_error() {
        let registry = ModuleRegistry::new(catalog_with(&[]), vec!["json".to_string()]);
        let result = registry.register(Path::new("/nonexistent/module/root"));
        assert!(matches!(result, Err(RegistryError::Scan { .. })));
    }

    #[tokio::test]
    async fn test_load_binds_only_backed_modules() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("Router.json"));
        touch(&root.path().join("Ghost.json"));

        let registry = ModuleRegistry::new(catalog_with(&["Router"]), vec!["json".to_string()]);
        registry.register(root.path()).unwrap();
        registry.load_all().await;

        assert!(registry.exists("Router").await);
        assert!(!registry.exists("Ghost").await);
        let report = registry.modules();
        assert_eq!(report.succeeded, vec!["Router".to_string()]);
        assert_eq!(report.failed, vec!["Ghost".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_module_resolution_is_explicit() {
        let registry = ModuleRegistry::new(catalog_with(&[]), vec!["json".to_string()]);
        let result = registry.resolve("Missing").await;
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_loads_import_once() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("Router.json"));

        let registry = Arc::new(ModuleRegistry::new(
            catalog_with(&["Router"]),
            vec!["json".to_string()],
        ));
        registry.register(root.path()).unwrap();

        let callers: Vec<_> = (0..10)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.load_module("Router").await.is_ok() })
            })
            .collect();
        for caller in callers {
            assert!(caller.await.unwrap());
        }

        // Exactly one underlying import, all callers bound to the same name.
        assert_eq!(registry.modules().succeeded, vec!["Router".to_string()]);
        assert!(registry.resolve("Router").await.is_ok());
    }

    #[tokio::test]
    async fn test_dependency_loads_before_dependent() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("Driver.json"));
        fs::create_dir(root.path().join("Driver")).unwrap();
        touch(&root.path().join("Driver").join("JsonDriver.json"));

        let registry = Arc::new(ModuleRegistry::new(
            catalog_with(&["Driver", "JsonDriver"]),
            vec!["json".to_string()],
        ));
        registry.register(root.path()).unwrap();
        registry.load_all().await;

        let report = registry.modules();
        let parent = report.succeeded.iter().position(|n| n == "Driver").unwrap();
        let child = report
            .succeeded
            .iter()
            .position(|n| n == "JsonDriver")
            .unwrap();
        assert!(parent < child);
        assert!(registry.record("JsonDriver").unwrap().loaded);
    }

    #[tokio::test]
    async fn test_failed_dependency_fails_dependent() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("Driver.json"));
        fs::create_dir(root.path().join("Driver")).unwrap();
        touch(&root.path().join("Driver").join("JsonDriver.json"));

        // "Driver" has a record on disk but no backing implementation.
        let registry = ModuleRegistry::new(catalog_with(&["JsonDriver"]), vec!["json".to_string()]);
        registry.register(root.path()).unwrap();
        registry.load_all().await;

        let report = registry.modules();
        assert!(report.failed.contains(&"Driver".to_string()));
        assert!(report.failed.contains(&"JsonDriver".to_string()));
        assert!(!registry.record("JsonDriver").unwrap().loaded);
    }

    #[tokio::test]
    async fn test_unregistered_dependency_is_omitted() {
        let registry = ModuleRegistry::new(catalog_with(&["Child"]), vec!["json".to_string()]);
        registry.register_module(ModuleRecord {
            name: "Child".to_string(),
            source: PathBuf::new(),
            dependency: Some("Phantom".to_string()),
            loaded: false,
        });
        registry.load_all().await;

        let report = registry.modules();
        assert_eq!(report.succeeded, vec!["Child".to_string()]);
        assert_eq!(report.omitted, vec!["Phantom".to_string()]);
    }

    #[tokio::test]
    async fn test_adopt_catalog_registers_every_name() {
        let registry = ModuleRegistry::new(
            catalog_with(&["Router", "Session"]),
            vec!["json".to_string()],
        );
        assert_eq!(registry.adopt_catalog(), 2);
        registry.load_all().await;
        assert!(registry.exists("Router").await);
        assert!(registry.exists("Session").await);
    }
}
