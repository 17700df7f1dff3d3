//! Shared engine state owned by the composition root.
//!
//! One [`EngineContext`] is built per session and passed (as `Arc`) to every component.
//! There are no module-level singletons.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use declara_core::{AiProvider, ClientConfig, GenerationBackend};

use crate::cancellation::CancellationRegistry;
use crate::documents::ProcessedDocuments;
use crate::events::{EngineEvent, EventBus};
use crate::queue::QueueStore;
use crate::streams::ActiveStreamMap;

pub struct EngineContext {
    pub config: ClientConfig,
    pub backend: Arc<dyn GenerationBackend>,
    pub queue: QueueStore,
    pub cancellations: CancellationRegistry,
    pub streams: ActiveStreamMap,
    pub documents: ProcessedDocuments,
    pub events: EventBus,
    processing: AtomicBool,
    provider: Mutex<AiProvider>,
}

impl EngineContext {
    pub fn new(config: ClientConfig, backend: Arc<dyn GenerationBackend>) -> Arc<Self> {
        let cancellations = CancellationRegistry::new();
        let streams = ActiveStreamMap::new();
        let documents = ProcessedDocuments::new();
        let events = EventBus::new(config.event_bus_capacity);
        let queue = QueueStore::new(
            &config.queue,
            cancellations.clone(),
            streams.clone(),
            documents.clone(),
            events.clone(),
        );
        let provider = Mutex::new(config.ai_provider);

        Arc::new(Self {
            config,
            backend,
            queue,
            cancellations,
            streams,
            documents,
            events,
            processing: AtomicBool::new(false),
            provider,
        })
    }

    /// Provider sent with the next generation request.
    pub fn provider(&self) -> AiProvider {
        *self.provider.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_provider(&self, provider: AiProvider) {
        *self.provider.lock().unwrap_or_else(PoisonError::into_inner) = provider;
        tracing::info!(provider = %provider, "AI provider changed");
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Set the global processing flag. Publishes only on an actual change.
    pub fn set_processing(&self, value: bool) {
        if self.processing.swap(value, Ordering::SeqCst) != value {
            self.events.publish(EngineEvent::ProcessingChanged(value));
        }
    }

    /// Raise the processing flag until the returned guard is dropped.
    pub fn begin_processing(self: &Arc<Self>) -> ProcessingGuard {
        self.set_processing(true);
        ProcessingGuard {
            ctx: Arc::clone(self),
        }
    }
}

/// Clears the processing flag on drop, including on early return or task abort.
pub struct ProcessingGuard {
    ctx: Arc<EngineContext>,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.ctx.set_processing(false);
    }
}
