//! Per-document pipeline: upload, declaration stream, cover stream.
//!
//! Every await is a point where the user may have removed the item or closed its
//! document. After each one the pipeline re-checks queue membership, status and the
//! cancellation registry before writing anything. A failed check is a silent abort.

use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use declara_core::models::{DocumentKind, ProvidersResponse, QueueItemId, QueueStatus, RemoteDocumentId};
use declara_core::{ErrorMetadata, LogLevel, StreamError};

use crate::context::EngineContext;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::session::{StreamOutcome, StreamSession};

/// How one item's pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    Completed,
    /// The declaration stands; the cover letter failed and was reported.
    CompletedWithoutCover,
    /// Removed, closed or cancelled by the user. Nothing is reported.
    Aborted,
    /// Upload or declaration failed; the item is marked `error`.
    Failed,
}

enum UploadStep {
    Done,
    Aborted,
    Failed,
}

#[derive(Clone)]
pub struct DocumentOrchestrator {
    ctx: Arc<EngineContext>,
}

impl DocumentOrchestrator {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    /// Run the full pipeline for one queued item. Never returns an error: failures are
    /// recorded on the item and published as events.
    #[tracing::instrument(skip(self), fields(item_id = %item_id))]
    pub async fn run(&self, item_id: QueueItemId) -> PipelineOutcome {
        let Some(item) = self.ctx.queue.find_by_id(item_id) else {
            tracing::debug!("Item no longer queued, skipping");
            return PipelineOutcome::Aborted;
        };

        if item.status == QueueStatus::Pending {
            match self.upload(item_id).await {
                UploadStep::Done => {}
                UploadStep::Aborted => return PipelineOutcome::Aborted,
                UploadStep::Failed => return PipelineOutcome::Failed,
            }
        }

        let Some((document_id, file_name)) = self.ctx.queue.begin_processing(item_id) else {
            tracing::debug!("Item removed, cancelled or not ready, skipping generation");
            if let Some(document_id) = item.remote_document_id {
                self.settle_abort(item_id, &document_id);
            }
            return PipelineOutcome::Aborted;
        };

        let outcome = self.generate(item_id, &document_id, &file_name).await;
        if outcome == PipelineOutcome::Aborted {
            self.settle_abort(item_id, &document_id);
        }
        tracing::info!(document_id = %document_id, outcome = ?outcome, "Document pipeline finished");
        outcome
    }

    async fn upload(&self, item_id: QueueItemId) -> UploadStep {
        if !self.ctx.queue.update_status(item_id, QueueStatus::Uploading) {
            return UploadStep::Aborted;
        }
        let Some(item) = self.ctx.queue.find_by_id(item_id) else {
            return UploadStep::Aborted;
        };

        match self.ctx.backend.upload(&item.file_name, item.file.clone()).await {
            Ok(document_id) => {
                if self.ctx.queue.mark_uploaded(item_id, document_id.clone()) {
                    tracing::info!(document_id = %document_id, file_name = %item.file_name, "File uploaded");
                    UploadStep::Done
                } else {
                    tracing::debug!(document_id = %document_id, "Item removed during upload, discarding id");
                    UploadStep::Aborted
                }
            }
            Err(e) => {
                report(&e, "Upload failed");
                if !self.ctx.queue.update_status(item_id, QueueStatus::Error) {
                    return UploadStep::Aborted;
                }
                self.ctx.events.publish(EngineEvent::UploadFailed {
                    item_id,
                    file_name: item.file_name,
                    message: e.client_message(),
                });
                UploadStep::Failed
            }
        }
    }

    async fn generate(
        &self,
        item_id: QueueItemId,
        document_id: &RemoteDocumentId,
        file_name: &str,
    ) -> PipelineOutcome {
        let declaration = self.stream(document_id, DocumentKind::Declaration).await;

        let outcome = match declaration {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancellation() => return PipelineOutcome::Aborted,
            Err(e) => {
                if !self.ctx.queue.is_still_processing(item_id, document_id) {
                    return PipelineOutcome::Aborted;
                }
                report(&e, "Declaration generation failed");
                self.ctx.queue.update_status(item_id, QueueStatus::Error);
                self.publish_error(document_id, file_name, DocumentKind::Declaration, &e);
                return PipelineOutcome::Failed;
            }
        };

        if !self.ctx.queue.is_still_processing(item_id, document_id) {
            return PipelineOutcome::Aborted;
        }
        let applicant = self.ctx.documents.store_declaration(
            document_id,
            file_name,
            outcome.text,
            outcome.filename,
        );
        // A removal can land between the check and the write
        if !self.ctx.queue.is_still_processing(item_id, document_id) {
            self.ctx.documents.remove(document_id);
            return PipelineOutcome::Aborted;
        }
        self.ctx.events.publish(EngineEvent::ApplicantIdentified {
            document_id: document_id.clone(),
            name: applicant,
        });

        let cover_failed = match self.stream(document_id, DocumentKind::Cover).await {
            Ok(cover) => {
                if !self.ctx.queue.is_still_processing(item_id, document_id) {
                    return PipelineOutcome::Aborted;
                }
                self.ctx
                    .documents
                    .store_cover(document_id, cover.text, cover.filename);
                false
            }
            Err(e) if e.is_cancellation() => return PipelineOutcome::Aborted,
            Err(e) => {
                if !self.ctx.queue.is_still_processing(item_id, document_id) {
                    return PipelineOutcome::Aborted;
                }
                report(&e, "Cover letter generation failed");
                self.publish_error(document_id, file_name, DocumentKind::Cover, &e);
                true
            }
        };

        if !self.ctx.queue.is_still_processing(item_id, document_id)
            || !self.ctx.queue.update_status(item_id, QueueStatus::Completed)
        {
            return PipelineOutcome::Aborted;
        }

        if cover_failed {
            PipelineOutcome::CompletedWithoutCover
        } else {
            PipelineOutcome::Completed
        }
    }

    async fn stream(
        &self,
        document_id: &RemoteDocumentId,
        kind: DocumentKind,
    ) -> Result<StreamOutcome, StreamError> {
        StreamSession::new(Arc::clone(&self.ctx), document_id.clone(), kind)
            .run()
            .await
    }

    /// Prune the cancellation entry once nothing can observe it any more. An item left
    /// in `processing` (its stream was replaced, not cancelled) becomes processable again.
    fn settle_abort(&self, item_id: QueueItemId, document_id: &RemoteDocumentId) {
        if self.ctx.queue.is_still_processing(item_id, document_id) {
            self.ctx.queue.update_status(item_id, QueueStatus::Uploaded);
            return;
        }
        if !self.ctx.queue.contains(item_id) && !self.ctx.streams.has_open(document_id) {
            self.ctx.cancellations.clear(document_id);
        }
    }

    fn publish_error(
        &self,
        document_id: &RemoteDocumentId,
        file_name: &str,
        kind: DocumentKind,
        error: &StreamError,
    ) {
        self.ctx.events.publish(EngineEvent::DocumentError {
            document_id: document_id.clone(),
            file_name: file_name.to_string(),
            kind,
            message: error.client_message(),
        });
    }

    /// Close a document's tab: stop its streams, forget its content and make its queue
    /// item processable again. Idempotent.
    #[tracing::instrument(skip(self), fields(document_id = %document_id))]
    pub fn close_document(&self, document_id: &RemoteDocumentId) {
        let closed = self.ctx.streams.close_all(document_id);

        if let Some(item) = self.ctx.queue.find_by_remote_id(document_id) {
            self.ctx.queue.update_status(item.id, QueueStatus::Uploaded);
            if self.ctx.is_processing() && !self.ctx.queue.any_processing_except(Some(item.id)) {
                tracing::debug!("No other document processing, clearing processing flag");
                self.ctx.set_processing(false);
            }
        }

        self.ctx.documents.remove(document_id);
        self.ctx.cancellations.clear(document_id);
        self.ctx.events.publish(EngineEvent::DocumentClosed {
            document_id: document_id.clone(),
        });
        tracing::info!(streams_closed = closed, "Document closed");
    }

    /// Re-run one stream alone for an already uploaded document, overwriting that
    /// artifact on success. Queue status is left as it is.
    #[tracing::instrument(skip(self), fields(document_id = %document_id, kind = %kind))]
    pub async fn regenerate(
        &self,
        document_id: &RemoteDocumentId,
        kind: DocumentKind,
    ) -> Result<StreamOutcome, EngineError> {
        let existing = self.ctx.documents.get(document_id);
        let file_name = match (&existing, kind) {
            (Some(doc), _) => doc.file_name.clone(),
            (None, DocumentKind::Declaration) => self
                .ctx
                .queue
                .find_by_remote_id(document_id)
                .map(|item| item.file_name)
                .ok_or_else(|| EngineError::DocumentNotFound(document_id.clone()))?,
            (None, DocumentKind::Cover) => {
                return Err(EngineError::DocumentNotFound(document_id.clone()))
            }
        };

        let outcome = match self.stream(document_id, kind).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancellation() => {
                if self.ctx.queue.find_by_remote_id(document_id).is_none() {
                    self.ctx.cancellations.clear(document_id);
                }
                return Err(e.into());
            }
            Err(e) => {
                report(&e, "Regeneration failed");
                self.publish_error(document_id, &file_name, kind, &e);
                return Err(e.into());
            }
        };

        if self.ctx.cancellations.is_cancelled(document_id) {
            return Err(StreamError::Cancelled.into());
        }

        match kind {
            DocumentKind::Declaration => {
                let applicant = self.ctx.documents.store_declaration(
                    document_id,
                    &file_name,
                    outcome.text.clone(),
                    outcome.filename.clone(),
                );
                self.ctx.events.publish(EngineEvent::ApplicantIdentified {
                    document_id: document_id.clone(),
                    name: applicant,
                });
            }
            DocumentKind::Cover => {
                // Closed while streaming
                if !self.ctx.documents.store_cover(
                    document_id,
                    outcome.text.clone(),
                    outcome.filename.clone(),
                ) {
                    return Err(EngineError::DocumentNotFound(document_id.clone()));
                }
            }
        }

        Ok(outcome)
    }

    /// Convert the current (possibly edited) content of one artifact into a file.
    /// Returns the suggested file name and the file bytes.
    pub async fn download_edited(
        &self,
        document_id: &RemoteDocumentId,
        kind: DocumentKind,
    ) -> Result<(String, Bytes), EngineError> {
        let doc = self
            .ctx
            .documents
            .get(document_id)
            .ok_or_else(|| EngineError::DocumentNotFound(document_id.clone()))?;
        let content = doc.content(kind).ok_or_else(|| EngineError::ContentMissing {
            document_id: document_id.clone(),
            kind,
        })?;

        let bytes = self
            .ctx
            .backend
            .download_edited(document_id, kind, content)
            .await?;

        tracing::info!(document_id = %document_id, kind = %kind, bytes = bytes.len(), "Edited document downloaded");
        Ok((doc.download_filename(kind), bytes))
    }

    /// Available providers. A failed request degrades to an empty, unsuccessful list.
    pub async fn providers(&self) -> ProvidersResponse {
        match self.ctx.backend.list_providers().await {
            Ok(providers) => providers,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load providers");
                ProvidersResponse::unavailable()
            }
        }
    }
}

/// Log an error at the level its metadata asks for.
pub(crate) fn report<E>(error: &E, message: &str)
where
    E: ErrorMetadata + Display,
{
    match error.log_level() {
        LogLevel::Debug => tracing::debug!(error = %error, code = error.error_code(), "{}", message),
        LogLevel::Warn => tracing::warn!(error = %error, code = error.error_code(), "{}", message),
        LogLevel::Error => tracing::error!(error = %error, code = error.error_code(), "{}", message),
    }
}
