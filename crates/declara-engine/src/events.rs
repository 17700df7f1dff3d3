//! Presentation events.
//!
//! The engine never renders anything. Every state change a presenter cares about is
//! published on a broadcast bus; presenters subscribe and repaint from the payloads (or
//! by reading the stores). Publishing with no subscriber is not an error.

use declara_core::models::{DocumentKind, QueueItemId, QueueStatus, RemoteDocumentId};
use declara_core::ValidationError;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Items were added or removed.
    QueueChanged { len: usize },
    ItemRejected { error: ValidationError },
    StatusChanged {
        item_id: QueueItemId,
        status: QueueStatus,
    },
    ProcessingChanged(bool),
    UploadFailed {
        item_id: QueueItemId,
        file_name: String,
        message: String,
    },
    StreamStarted {
        document_id: RemoteDocumentId,
        kind: DocumentKind,
    },
    /// Coalesced snapshot of everything received so far on one stream.
    ContentFlushed {
        document_id: RemoteDocumentId,
        kind: DocumentKind,
        text: String,
    },
    StreamFinished {
        document_id: RemoteDocumentId,
        kind: DocumentKind,
        filename: Option<String>,
        /// The connection dropped after content arrived; the text may be truncated.
        partial: bool,
    },
    ApplicantIdentified {
        document_id: RemoteDocumentId,
        name: String,
    },
    /// A generation step failed. Never published for user cancellation.
    DocumentError {
        document_id: RemoteDocumentId,
        file_name: String,
        kind: DocumentKind,
        message: String,
    },
    DocumentClosed { document_id: RemoteDocumentId },
    ChatChunk {
        document_id: RemoteDocumentId,
        text: String,
    },
    PreviewReady { item_id: QueueItemId },
}

/// Broadcast bus for [`EngineEvent`]s. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: EngineEvent) {
        // No receivers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}
