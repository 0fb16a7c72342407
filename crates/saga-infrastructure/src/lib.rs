//! Filesystem side of saga: paths, config and secret files, and the
//! snapshot stores.

pub mod dto;
pub mod file_snapshot_store;
pub mod in_memory_snapshot_store;
pub mod paths;
pub mod storage;

pub use crate::file_snapshot_store::FileSnapshotStore;
pub use crate::in_memory_snapshot_store::InMemorySnapshotStore;
pub use crate::paths::SagaPaths;
pub use crate::storage::{ConfigStorage, SecretStorage};
