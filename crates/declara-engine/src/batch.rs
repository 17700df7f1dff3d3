//! "Process all": drive every eligible queue item through its pipeline, one at a time.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::context::EngineContext;
use crate::error::EngineError;
use crate::orchestrator::{DocumentOrchestrator, PipelineOutcome};

/// Tally of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub completed: usize,
    /// Completed with a declaration but no cover letter.
    pub partial: usize,
    pub failed: usize,
    pub aborted: usize,
    /// Removed or cancelled before their turn came.
    pub skipped: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.completed + self.partial + self.failed + self.aborted + self.skipped
    }
}

#[derive(Clone)]
pub struct BatchProcessor {
    orchestrator: DocumentOrchestrator,
    running: Arc<Mutex<()>>,
}

impl BatchProcessor {
    pub fn new(orchestrator: DocumentOrchestrator) -> Self {
        Self {
            orchestrator,
            running: Arc::new(Mutex::new(())),
        }
    }

    fn ctx(&self) -> &Arc<EngineContext> {
        self.orchestrator.context()
    }

    /// Process every `pending` or `uploaded` item in queue order.
    ///
    /// The eligible set is snapshotted up front; each item is re-validated right before
    /// its turn. Per-item failures never stop the batch. A second call while one is
    /// running is refused.
    pub async fn process_all(&self) -> Result<BatchReport, EngineError> {
        let _running = self
            .running
            .try_lock()
            .map_err(|_| EngineError::AlreadyProcessing)?;

        let eligible = self.ctx().queue.eligible_ids();
        let mut report = BatchReport::default();
        if eligible.is_empty() {
            return Ok(report);
        }

        tracing::info!(items = eligible.len(), "Processing queue");
        let _processing = self.ctx().begin_processing();

        for item_id in eligible {
            let Some(item) = self.ctx().queue.find_by_id(item_id) else {
                tracing::debug!(item_id = %item_id, "Removed from queue, skipping");
                report.skipped += 1;
                continue;
            };
            if item
                .remote_document_id
                .as_ref()
                .is_some_and(|id| self.ctx().cancellations.is_cancelled(id))
            {
                tracing::debug!(item_id = %item_id, "Cancelled, skipping");
                report.skipped += 1;
                continue;
            }

            // Closing the last processing document may have lowered the flag
            self.ctx().set_processing(true);

            match self.orchestrator.run(item_id).await {
                PipelineOutcome::Completed => report.completed += 1,
                PipelineOutcome::CompletedWithoutCover => report.partial += 1,
                PipelineOutcome::Failed => report.failed += 1,
                PipelineOutcome::Aborted => report.aborted += 1,
            }
        }

        tracing::info!(
            completed = report.completed,
            partial = report.partial,
            failed = report.failed,
            aborted = report.aborted,
            skipped = report.skipped,
            "Queue processed"
        );
        Ok(report)
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::offline_context;
    use declara_core::models::{QueueStatus, SourceFile};

    #[tokio::test]
    async fn test_empty_queue_is_a_no_op() {
        let ctx = offline_context();
        let batch = BatchProcessor::new(DocumentOrchestrator::new(ctx.clone()));

        let report = batch.process_all().await.unwrap();

        assert_eq!(report, BatchReport::default());
        assert!(!ctx.is_processing());
    }

    #[tokio::test]
    async fn test_upload_failures_do_not_stop_the_batch() {
        let ctx = offline_context();
        ctx.queue.add_files(vec![
            SourceFile::new("a.txt", b"one".to_vec()),
            SourceFile::new("b.txt", b"two".to_vec()),
        ]);
        let batch = BatchProcessor::new(DocumentOrchestrator::new(ctx.clone()));

        let report = batch.process_all().await.unwrap();

        assert_eq!(report.failed, 2);
        assert_eq!(report.total(), 2);
        assert!(ctx
            .queue
            .items()
            .iter()
            .all(|item| item.status == QueueStatus::Error));
        assert!(!ctx.is_processing());
        assert!(!batch.is_running());
    }
}
