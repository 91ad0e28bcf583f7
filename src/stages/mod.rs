//! Concrete pipeline stages.
//!
//! Each stage implements the one-method [`Stage`](crate::core::Stage)
//! contract; behavior is composed through the application stack rather than
//! through inheritance. The dispatch-table stages (Controller, Model,
//! Driver) share the `not_allowed` reply shape: the `Allow` header always
//! enumerates exactly the operations a table supports.
pub mod access;
pub mod application;
pub mod controller;
pub mod driver;
pub mod model;
pub mod router;
pub mod session;

pub use access::AccessStage;
pub use application::ApplicationStage;
pub use controller::ControllerStage;
pub use driver::{BackendDriverStage, DriverStage};
pub use model::{ModelSettings, ModelStage};
pub use router::RouterStage;
pub use session::SessionStage;

use crate::core::envelope::{Envelope, Reply};

/// The `notAllowed` reply for an operation table: `Allow` lists the table's
/// keys uppercased, comma-separated.
pub(crate) fn not_allowed(operations: &[&str]) -> Envelope {
    let allow = operations
        .iter()
        .map(|operation| operation.to_uppercase())
        .collect::<Vec<_>>()
        .join(", ");
    Envelope::respond(Reply::NotAllowed).with_header("Allow", allow)
}
