//! Registry of open generation streams.
//!
//! At most one declaration and one cover stream per remote document. This map is the
//! only source of truth for "is a stream open for this document and kind". Closing a
//! handle fires its [`CancellationToken`], which wakes the owning session even when the
//! server has gone silent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use declara_core::models::{DocumentKind, RemoteDocumentId};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct StreamHandle {
    session_id: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct StreamSlots {
    declaration: Option<StreamHandle>,
    cover: Option<StreamHandle>,
}

impl StreamSlots {
    fn slot(&mut self, kind: DocumentKind) -> &mut Option<StreamHandle> {
        match kind {
            DocumentKind::Declaration => &mut self.declaration,
            DocumentKind::Cover => &mut self.cover,
        }
    }

    fn is_empty(&self) -> bool {
        self.declaration.is_none() && self.cover.is_none()
    }
}

/// What a session gets back when it registers: its identity and its close signal.
#[derive(Debug, Clone)]
pub struct StreamRegistration {
    pub session_id: u64,
    pub token: CancellationToken,
}

#[derive(Debug, Clone, Default)]
pub struct ActiveStreamMap {
    inner: Arc<Mutex<HashMap<RemoteDocumentId, StreamSlots>>>,
    next_session: Arc<AtomicU64>,
}

impl ActiveStreamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session for `(document_id, kind)`.
    ///
    /// A session already holding the slot is closed first, so a regeneration replaces
    /// rather than races the previous stream.
    pub fn register(&self, document_id: &RemoteDocumentId, kind: DocumentKind) -> StreamRegistration {
        let session_id = self.next_session.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();

        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = map.entry(document_id.clone()).or_default().slot(kind);
        if let Some(previous) = slot.replace(StreamHandle {
            session_id,
            token: token.clone(),
        }) {
            tracing::debug!(
                document_id = %document_id,
                kind = %kind,
                previous_session = previous.session_id,
                "Replacing open stream"
            );
            previous.token.cancel();
        }

        StreamRegistration { session_id, token }
    }

    /// Remove the entry if it still belongs to `session_id`. Used by a session on settle.
    pub fn release(&self, document_id: &RemoteDocumentId, kind: DocumentKind, session_id: u64) -> bool {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(slots) = map.get_mut(document_id) else {
            return false;
        };

        let slot = slots.slot(kind);
        let owned = slot.as_ref().is_some_and(|h| h.session_id == session_id);
        if owned {
            slot.take();
        }
        if slots.is_empty() {
            map.remove(document_id);
        }
        owned
    }

    /// Close one stream. Returns whether a stream was open.
    pub fn close(&self, document_id: &RemoteDocumentId, kind: DocumentKind) -> bool {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(slots) = map.get_mut(document_id) else {
            return false;
        };

        let closed = slots.slot(kind).take().map(|h| h.token.cancel()).is_some();
        if slots.is_empty() {
            map.remove(document_id);
        }
        closed
    }

    /// Close every stream of a document. Returns how many were open.
    pub fn close_all(&self, document_id: &RemoteDocumentId) -> usize {
        let removed = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(document_id);

        let Some(slots) = removed else {
            return 0;
        };

        [slots.declaration, slots.cover]
            .into_iter()
            .flatten()
            .map(|handle| handle.token.cancel())
            .count()
    }

    pub fn is_open(&self, document_id: &RemoteDocumentId, kind: DocumentKind) -> bool {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(document_id).is_some_and(|slots| match kind {
            DocumentKind::Declaration => slots.declaration.is_some(),
            DocumentKind::Cover => slots.cover.is_some(),
        })
    }

    pub fn has_open(&self, document_id: &RemoteDocumentId) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(document_id)
    }

    /// Number of documents with at least one open stream.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
