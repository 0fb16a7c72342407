//! File-level storage primitives.

pub mod atomic_json;
pub mod config_storage;
pub mod secret_storage;

pub use atomic_json::AtomicJsonFile;
pub use config_storage::{ConfigStorage, TTL_ENV};
pub use secret_storage::SecretStorage;
