pub mod config;
pub mod error;
pub mod generation;
pub mod scoring;
pub mod session;
pub mod turn;
pub mod world;

// Re-export common error type
pub use error::{Result, SagaError};
