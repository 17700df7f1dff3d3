//! Declara Engine
//!
//! Multi-document upload queue and streaming generation pipeline. The engine drives
//! each queued file through upload, a declaration stream and a dependent cover-letter
//! stream, and reconciles user cancellation against everything in flight. It renders
//! nothing itself: presenters subscribe to [`EngineEvent`]s.

pub mod batch;
pub mod cancellation;
pub mod chat;
pub mod context;
pub mod documents;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod preview;
pub mod queue;
pub mod session;
pub mod streams;

use std::sync::Arc;

use declara_core::models::{QueueItemId, SourceFile};
use declara_core::{ClientConfig, GenerationBackend};
use tokio::sync::broadcast;

pub use batch::{BatchProcessor, BatchReport};
pub use cancellation::CancellationRegistry;
pub use chat::ChatSession;
pub use context::{EngineContext, ProcessingGuard};
pub use documents::ProcessedDocuments;
pub use error::EngineError;
pub use events::{EngineEvent, EventBus};
pub use orchestrator::{DocumentOrchestrator, PipelineOutcome};
pub use preview::{DefaultPreviewRenderer, PreviewRenderer, PreviewService};
pub use queue::{AddFilesReport, QueueStore, Rejection};
pub use session::{StreamOutcome, StreamSession};
pub use streams::ActiveStreamMap;

/// Every engine component wired to one shared context.
#[derive(Clone)]
pub struct Engine {
    pub ctx: Arc<EngineContext>,
    pub orchestrator: DocumentOrchestrator,
    pub batch: BatchProcessor,
    pub chat: ChatSession,
    pub previews: PreviewService,
}

impl Engine {
    pub fn new(config: ClientConfig, backend: Arc<dyn GenerationBackend>) -> Self {
        let ctx = EngineContext::new(config, backend);
        let orchestrator = DocumentOrchestrator::new(Arc::clone(&ctx));
        Self {
            batch: BatchProcessor::new(orchestrator.clone()),
            chat: ChatSession::new(Arc::clone(&ctx)),
            previews: PreviewService::new(Arc::clone(&ctx)),
            orchestrator,
            ctx,
        }
    }

    pub fn add_files(&self, files: Vec<SourceFile>) -> AddFilesReport {
        self.ctx.queue.add_files(files)
    }

    pub fn remove(&self, item_id: QueueItemId) -> bool {
        self.ctx.queue.remove(item_id)
    }

    /// Remove every queued item, cancelling whatever is in flight. Returns how many
    /// items were removed.
    pub fn cancel_all(&self) -> usize {
        self.ctx
            .queue
            .ids()
            .into_iter()
            .filter(|id| self.ctx.queue.remove(*id))
            .count()
    }

    pub async fn process_all(&self) -> Result<BatchReport, EngineError> {
        self.batch.process_all().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.ctx.events.subscribe()
    }
}
