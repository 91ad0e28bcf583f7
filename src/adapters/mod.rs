pub mod http_server;
pub mod json_backend;

/// Re-export commonly used types from adapters
pub use http_server::app;
pub use json_backend::JsonBackend;
