//! The generation backend as seen by the engine.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::config::AiProvider;
use crate::error::BackendError;
use crate::models::{
    ChatEvent, ChatRequest, DocumentKind, ProvidersResponse, RemoteDocumentId, StreamEvent,
};

/// A lazy, finite, non-restartable sequence of decoded events.
///
/// An `Err` item is a connection-level failure or an undecodable payload. The stream
/// yields nothing after a connection failure; after an undecodable payload it ends only
/// when [`StreamPayload::MALFORMED_ENDS_STREAM`](crate::models::StreamPayload) is set.
/// Dropping the stream closes the underlying connection.
pub type EventStream<T> = BoxStream<'static, Result<T, BackendError>>;

/// Remote collaborator that stores uploads, generates documents and converts edits.
///
/// Implemented over HTTP by `declara-api-client`; tests use scripted in-memory doubles.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Store a source file and return the id used for every later call.
    async fn upload(&self, file_name: &str, bytes: Bytes) -> Result<RemoteDocumentId, BackendError>;

    /// Open the generation stream for one artifact of an uploaded document.
    async fn open_generation(
        &self,
        document_id: &RemoteDocumentId,
        kind: DocumentKind,
        provider: AiProvider,
    ) -> Result<EventStream<StreamEvent>, BackendError>;

    async fn open_chat(&self, request: &ChatRequest) -> Result<EventStream<ChatEvent>, BackendError>;

    /// Convert edited markdown content into a downloadable file.
    async fn download_edited(
        &self,
        document_id: &RemoteDocumentId,
        kind: DocumentKind,
        content: &str,
    ) -> Result<Bytes, BackendError>;

    async fn list_providers(&self) -> Result<ProvidersResponse, BackendError>;

    async fn clear_chat_memory(&self, user_id: &str) -> Result<(), BackendError>;
}
