//! The ordered upload queue and each item's lifecycle status.
//!
//! All mutations take the queue lock once and leave the store consistent. The
//! cancellation, stream and document stores are only ever locked *inside* the queue
//! lock, never the other way round.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use declara_core::models::{
    PreviewState, QueueItem, QueueItemId, QueueStatus, RemoteDocumentId, SourceFile,
};
use declara_core::{DocumentValidator, QueueLimits, ValidationError};

use crate::cancellation::CancellationRegistry;
use crate::documents::ProcessedDocuments;
use crate::events::{EngineEvent, EventBus};
use crate::streams::ActiveStreamMap;

/// A file refused by [`QueueStore::add_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub file_name: String,
    pub error: ValidationError,
}

#[derive(Debug, Default)]
pub struct AddFilesReport {
    pub added: Vec<QueueItemId>,
    pub rejected: Vec<Rejection>,
}

#[derive(Debug, Clone)]
pub struct QueueStore {
    items: Arc<Mutex<Vec<QueueItem>>>,
    validator: DocumentValidator,
    max_documents: usize,
    cancellations: CancellationRegistry,
    streams: ActiveStreamMap,
    documents: ProcessedDocuments,
    events: EventBus,
}

impl QueueStore {
    pub fn new(
        limits: &QueueLimits,
        cancellations: CancellationRegistry,
        streams: ActiveStreamMap,
        documents: ProcessedDocuments,
        events: EventBus,
    ) -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
            validator: DocumentValidator::new(limits),
            max_documents: limits.max_documents,
            cancellations,
            streams,
            documents,
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<QueueItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate and append files in input order.
    ///
    /// Nothing is added when the queue is already full. Otherwise files are accepted until
    /// the queue reaches capacity; the rest are rejected as `QueueFull`.
    pub fn add_files(&self, files: Vec<SourceFile>) -> AddFilesReport {
        let mut report = AddFilesReport::default();
        let mut items = self.lock();
        let mut accepted: Vec<QueueItem> = Vec::new();

        for file in files {
            let outcome = if items.len() + accepted.len() >= self.max_documents {
                Err(ValidationError::QueueFull {
                    max: self.max_documents,
                })
            } else if items
                .iter()
                .chain(accepted.iter())
                .any(|item| item.file_name == file.name)
            {
                Err(ValidationError::Duplicate {
                    file_name: file.name.clone(),
                })
            } else {
                self.validator.validate(&file)
            };

            match outcome {
                Ok(()) => accepted.push(QueueItem::from_source(file)),
                Err(error) => {
                    tracing::warn!(file_name = %file.name, error = %error, "File rejected");
                    report.rejected.push(Rejection {
                        file_name: file.name,
                        error,
                    });
                }
            }
        }

        report.added = accepted.iter().map(|item| item.id).collect();
        items.extend(accepted);
        let len = items.len();
        drop(items);

        for rejection in &report.rejected {
            self.events.publish(EngineEvent::ItemRejected {
                error: rejection.error.clone(),
            });
        }
        if !report.added.is_empty() {
            tracing::info!(added = report.added.len(), queue_len = len, "Files queued");
            self.events.publish(EngineEvent::QueueChanged { len });
        }

        report
    }

    /// Remove an item, cancelling everything in flight for it first.
    ///
    /// Returns false (and does nothing) if the item is not queued.
    pub fn remove(&self, item_id: QueueItemId) -> bool {
        let mut items = self.lock();
        let Some(index) = items.iter().position(|item| item.id == item_id) else {
            return false;
        };

        if let Some(document_id) = items[index].remote_document_id.clone() {
            self.cancellations.mark_cancelled(&document_id);
            let closed = self.streams.close_all(&document_id);
            self.documents.remove(&document_id);

            // With nothing in flight there is no one left to observe the entry.
            if closed == 0 && items[index].status != QueueStatus::Processing {
                self.cancellations.clear(&document_id);
            }

            tracing::info!(
                item_id = %item_id,
                document_id = %document_id,
                streams_closed = closed,
                "Queued document cancelled"
            );
        }

        items.remove(index);
        let len = items.len();
        drop(items);

        self.events.publish(EngineEvent::QueueChanged { len });
        true
    }

    pub fn find_by_id(&self, item_id: QueueItemId) -> Option<QueueItem> {
        self.lock().iter().find(|item| item.id == item_id).cloned()
    }

    pub fn find_by_remote_id(&self, document_id: &RemoteDocumentId) -> Option<QueueItem> {
        self.lock()
            .iter()
            .find(|item| item.remote_document_id.as_ref() == Some(document_id))
            .cloned()
    }

    pub fn contains(&self, item_id: QueueItemId) -> bool {
        self.lock().iter().any(|item| item.id == item_id)
    }

    /// Set an item's status. Illegal transitions are refused and logged.
    pub fn update_status(&self, item_id: QueueItemId, status: QueueStatus) -> bool {
        let mut items = self.lock();
        let Some(item) = items.iter_mut().find(|item| item.id == item_id) else {
            return false;
        };

        if item.status == status {
            return true;
        }

        if !item.status.can_transition_to(status) {
            tracing::warn!(
                item_id = %item_id,
                from = %item.status,
                to = %status,
                "Refusing illegal status transition"
            );
            return false;
        }

        item.status = status;
        drop(items);

        self.events
            .publish(EngineEvent::StatusChanged { item_id, status });
        true
    }

    /// Record a successful upload. Only applies to an item that is still uploading.
    pub fn mark_uploaded(&self, item_id: QueueItemId, document_id: RemoteDocumentId) -> bool {
        let mut items = self.lock();
        let Some(item) = items
            .iter_mut()
            .find(|item| item.id == item_id && item.status == QueueStatus::Uploading)
        else {
            return false;
        };

        item.remote_document_id = Some(document_id);
        item.status = QueueStatus::Uploaded;
        drop(items);

        self.events.publish(EngineEvent::StatusChanged {
            item_id,
            status: QueueStatus::Uploaded,
        });
        true
    }

    /// Atomically check that an uploaded, uncancelled item is still queued and mark it
    /// `processing`. Returns its remote id and file name.
    pub fn begin_processing(&self, item_id: QueueItemId) -> Option<(RemoteDocumentId, String)> {
        let mut items = self.lock();
        let item = items.iter_mut().find(|item| item.id == item_id)?;
        let document_id = item.remote_document_id.clone()?;

        if item.status != QueueStatus::Uploaded || self.cancellations.is_cancelled(&document_id) {
            return None;
        }

        item.status = QueueStatus::Processing;
        let file_name = item.file_name.clone();
        drop(items);

        self.events.publish(EngineEvent::StatusChanged {
            item_id,
            status: QueueStatus::Processing,
        });
        Some((document_id, file_name))
    }

    /// Freshness check after every suspension point of a running pipeline: the item is
    /// still queued, still `processing`, and its document is not cancelled.
    pub fn is_still_processing(&self, item_id: QueueItemId, document_id: &RemoteDocumentId) -> bool {
        let items = self.lock();
        let present = items.iter().any(|item| {
            item.id == item_id
                && item.status == QueueStatus::Processing
                && item.remote_document_id.as_ref() == Some(document_id)
        });
        present && !self.cancellations.is_cancelled(document_id)
    }

    /// Ids of items "process all" should pick up, in queue order.
    pub fn eligible_ids(&self) -> Vec<QueueItemId> {
        self.lock()
            .iter()
            .filter(|item| item.status.is_eligible())
            .map(|item| item.id)
            .collect()
    }

    pub fn any_processing_except(&self, item_id: Option<QueueItemId>) -> bool {
        self.lock()
            .iter()
            .any(|item| item.status == QueueStatus::Processing && Some(item.id) != item_id)
    }

    /// Mutate an item's preview state and return the new state.
    pub fn update_preview<F>(&self, item_id: QueueItemId, f: F) -> Option<PreviewState>
    where
        F: FnOnce(&mut PreviewState),
    {
        let mut items = self.lock();
        let item = items.iter_mut().find(|item| item.id == item_id)?;
        f(&mut item.preview);
        Some(item.preview.clone())
    }

    pub fn items(&self) -> Vec<QueueItem> {
        self.lock().clone()
    }

    pub fn ids(&self) -> Vec<QueueItemId> {
        self.lock().iter().map(|item| item.id).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
