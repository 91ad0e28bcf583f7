//! Folio - a pluggable request-processing engine for document-serving
//! applications.
//!
//! Folio turns an HTTP request into a document operation through a
//! chain-of-responsibility pipeline of **stages** resolved by name from a
//! **module registry**. The stock chain routes the request, resolves a
//! session, derives an access filter, dispatches on the HTTP verb, prepares
//! a normalized operation descriptor, and hands it to a storage driver.
//! Every stage resolves to the same status-tagged response envelope, so
//! transport mapping happens in exactly one place.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use folio::{config::loader::load_config, core::Engine};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let config = load_config("config.yaml").await?;
//! let engine = Arc::new(Engine::from_config(&config).await?);
//! let app = folio::adapters::app(engine);
//! // hand `app` to axum::serve (see the binary crate)
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations)
//! while keeping business logic inside `core`. Concrete stages live in
//! `stages`; deployments extend the engine by offering additional factories
//! to the [`core::Catalog`] before the registry loads.
//!
//! # Error Handling
//! Assembly-time APIs return `eyre::Result<T>` or a domain specific error
//! type. At request time no error crosses the pipeline boundary: internal
//! faults are normalized into opaque `error` envelopes.
//!
//! # Concurrency & Data Structures
//! For shared mutable maps the project uses `scc::HashMap` instead of
//! `dashmap` to maintain predictable performance characteristics under
//! contention. Module imports are single-flight behind `tokio::sync::OnceCell`
//! gates.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;
pub mod stages;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::JsonBackend,
    core::{Engine, Envelope, Pipeline, RequestMeta},
    ports::storage::StorageBackend,
    utils::GracefulShutdown,
};
