use declara_core::models::{DocumentKind, QueueItemId, RemoteDocumentId};
use declara_core::{BackendError, ErrorMetadata, LogLevel, StreamError};

/// Failures of engine operations invoked directly by the user.
///
/// Pipeline failures inside a batch are never returned this way; they are reported
/// through events and the batch moves on.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Queue item not found: {0}")]
    ItemNotFound(QueueItemId),

    #[error("No generated document for id {0}")]
    DocumentNotFound(RemoteDocumentId),

    #[error("Document {document_id} has no {kind} content yet")]
    ContentMissing {
        document_id: RemoteDocumentId,
        kind: DocumentKind,
    },

    #[error("Documents are already being processed")]
    AlreadyProcessing,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("No modified text provided")]
    EmptyModification,

    #[error("Preview rendering failed: {0}")]
    Preview(String),
}

impl EngineError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, EngineError::Stream(e) if e.is_cancellation())
    }
}

impl ErrorMetadata for EngineError {
    fn error_code(&self) -> &'static str {
        match self {
            EngineError::ItemNotFound(_) => "ITEM_NOT_FOUND",
            EngineError::DocumentNotFound(_) => "DOCUMENT_NOT_FOUND",
            EngineError::ContentMissing { .. } => "CONTENT_MISSING",
            EngineError::AlreadyProcessing => "ALREADY_PROCESSING",
            EngineError::EmptyModification => "EMPTY_MODIFICATION",
            EngineError::Backend(e) => e.error_code(),
            EngineError::Stream(e) => e.error_code(),
            EngineError::Preview(_) => "PREVIEW_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            EngineError::AlreadyProcessing => true,
            EngineError::Backend(e) => e.is_recoverable(),
            EngineError::Stream(e) => e.is_recoverable(),
            _ => false,
        }
    }

    fn client_message(&self) -> String {
        match self {
            EngineError::Backend(e) => e.client_message(),
            EngineError::Stream(e) => e.client_message(),
            other => other.to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            EngineError::Backend(e) => e.log_level(),
            EngineError::Stream(e) => e.log_level(),
            EngineError::Preview(_) => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}
