pub mod storage;

pub use storage::{BackendError, BackendResult, OperationDescriptor, StorageBackend};
