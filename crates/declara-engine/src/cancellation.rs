//! Remote document ids the user has cancelled.
//!
//! Independent of queue membership: an item can be removed from the queue while its
//! stream is still draining, and the stream must still see the cancellation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use declara_core::models::RemoteDocumentId;

#[derive(Debug, Clone, Default)]
pub struct CancellationRegistry {
    cancelled: Arc<Mutex<HashSet<RemoteDocumentId>>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_cancelled(&self, document_id: &RemoteDocumentId) {
        let mut cancelled = self.cancelled.lock().unwrap_or_else(PoisonError::into_inner);
        if cancelled.insert(document_id.clone()) {
            tracing::debug!(document_id = %document_id, "Document marked cancelled");
        }
    }

    pub fn is_cancelled(&self, document_id: &RemoteDocumentId) -> bool {
        self.cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(document_id)
    }

    /// Prune an entry. Returns whether it was present.
    pub fn clear(&self, document_id: &RemoteDocumentId) -> bool {
        self.cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(document_id)
    }

    pub fn len(&self) -> usize {
        self.cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
