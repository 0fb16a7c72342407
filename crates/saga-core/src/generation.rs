//! Language-model seam.
//!
//! The engine never talks to a model directly. Everything goes through a
//! [`GenerationProvider`], which offers a request/response call and a
//! streaming call for structured (tool-call) output.

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

/// A request for one structured result matching `schema`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    pub system: String,
    pub prompt: String,
    /// Name of the single tool the model is forced to call
    pub tool_name: String,
    pub tool_description: String,
    /// JSON schema of the tool input
    pub schema: Value,
    pub max_tokens: u32,
}

/// Item of a structured generation stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Raw JSON text fragment of the structured result
    Delta(String),
    /// Authoritative result once the stream has finished. `None` when the
    /// provider produced nothing parseable.
    Completed(Option<Value>),
}

pub type GenerationStream = BoxStream<'static, Result<StreamEvent>>;

/// Opaque text-generation backend.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Performs one request and returns the structured result.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::UpstreamGeneration` when the call fails or yields
    /// no structured result.
    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value>;

    /// Starts a streaming request.
    ///
    /// The stream yields zero or more `Delta`s and then exactly one
    /// `Completed`, or an `Err` item if the transport fails midway.
    async fn stream_structured(&self, request: StructuredRequest) -> Result<GenerationStream>;
}
