pub mod context;
pub mod engine;
pub mod envelope;
pub mod pipeline;
pub mod registry;
pub mod router;
pub mod session;

pub use context::Context;
pub use engine::Engine;
pub use envelope::{Envelope, Reply, Status};
pub use pipeline::{Pipeline, PipelineOutcome, RequestMeta, Stage, StageError};
pub use registry::{Catalog, ModuleRegistry, RegistryError, StageFactory};
pub use router::{RouteMatch, RouteTable};
pub use session::{SessionRecord, SessionSettings, SessionStore};
