//! crates/syllabus_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the pipeline's external collaborators.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete object store, model provider, or calendar API.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

use crate::domain::{AccessToken, CalendarEventRequest, InsertedEvent};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (storage, HTTP APIs).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Transfer failed: {0}")]
    Transfer(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A lazy, single-pass listing of storage keys.
pub type KeyStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `key`, overwriting silently, and returns the object's public URL.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> PortResult<String>;

    /// Lists every key starting with `prefix`. An empty listing is not an error.
    async fn list(&self, prefix: &str) -> PortResult<KeyStream>;

    /// Fetches an object's bytes; `NotFound` if the key is absent.
    async fn get_bytes(&self, key: &str) -> PortResult<Bytes>;

    /// Whether the backend was configured and is usable.
    fn is_ready(&self) -> bool {
        true
    }
}

/// A document embedded directly in an inference request.
#[derive(Debug, Clone)]
pub struct InlineAttachment {
    pub mime_type: String,
    pub data: Bytes,
}

/// One round trip to the language model: an instruction plus attached documents.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub prompt: String,
    pub attachments: Vec<InlineAttachment>,
}

#[async_trait]
pub trait ExtractionModel: Send + Sync {
    /// Runs the request and returns the model's raw text output.
    async fn generate(&self, request: &InferenceRequest) -> PortResult<String>;
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Inserts one event into the credential owner's primary calendar.
    async fn insert_event(
        &self,
        token: &AccessToken,
        event: &CalendarEventRequest,
    ) -> PortResult<InsertedEvent>;
}
