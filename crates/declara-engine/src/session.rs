//! One generation stream (declaration or cover) for one remote document.
//!
//! The session pulls decoded events until a terminal event, a connection failure or
//! cancellation. Before acting on anything it re-reads the cancellation registry:
//! cancellation may land between any two events. Content is appended to an append-only
//! buffer and published as coalesced snapshots at most once per typing window.

use std::sync::Arc;
use std::time::Duration;

use declara_core::models::{DocumentKind, RemoteDocumentId, StreamEvent};
use declara_core::{BackendError, StreamError};
use futures::StreamExt;
use tokio::time::{sleep_until, Instant};

use crate::context::EngineContext;
use crate::events::EngineEvent;
use crate::streams::StreamRegistration;

/// Resolved value of a successful session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub text: String,
    pub filename: Option<String>,
    /// The connection dropped after some content arrived. The text may be truncated.
    pub partial: bool,
}

pub struct StreamSession {
    ctx: Arc<EngineContext>,
    document_id: RemoteDocumentId,
    kind: DocumentKind,
}

impl StreamSession {
    pub fn new(ctx: Arc<EngineContext>, document_id: RemoteDocumentId, kind: DocumentKind) -> Self {
        Self {
            ctx,
            document_id,
            kind,
        }
    }

    /// Run the stream to settlement. Single attempt, no retry.
    ///
    /// The session owns its [`ActiveStreamMap`](crate::streams::ActiveStreamMap) entry
    /// and releases it however it settles.
    pub async fn run(self) -> Result<StreamOutcome, StreamError> {
        self.ensure_not_cancelled()?;

        let registration = self.ctx.streams.register(&self.document_id, self.kind);
        self.ctx.events.publish(EngineEvent::StreamStarted {
            document_id: self.document_id.clone(),
            kind: self.kind,
        });
        tracing::debug!(
            document_id = %self.document_id,
            kind = %self.kind,
            session_id = registration.session_id,
            "Stream opened"
        );

        let result = self.drive(&registration).await;
        self.ctx
            .streams
            .release(&self.document_id, self.kind, registration.session_id);

        match &result {
            Ok(outcome) => {
                self.ctx.events.publish(EngineEvent::StreamFinished {
                    document_id: self.document_id.clone(),
                    kind: self.kind,
                    filename: outcome.filename.clone(),
                    partial: outcome.partial,
                });
                tracing::debug!(
                    document_id = %self.document_id,
                    kind = %self.kind,
                    chars = outcome.text.len(),
                    partial = outcome.partial,
                    "Stream settled"
                );
            }
            Err(e) => {
                tracing::debug!(
                    document_id = %self.document_id,
                    kind = %self.kind,
                    error = %e,
                    "Stream rejected"
                );
            }
        }

        result
    }

    async fn drive(&self, registration: &StreamRegistration) -> Result<StreamOutcome, StreamError> {
        let provider = self.ctx.provider();
        let mut events = tokio::select! {
            biased;
            _ = registration.token.cancelled() => return Err(StreamError::Cancelled),
            opened = self.ctx.backend.open_generation(&self.document_id, self.kind, provider) => opened?,
        };

        let mut buffer = String::new();
        let mut coalescer = Coalescer::new(self.ctx.config.typing_effect_delay);

        loop {
            let deadline = coalescer.deadline;
            tokio::select! {
                biased;
                _ = registration.token.cancelled() => return Err(StreamError::Cancelled),
                _ = flush_due(deadline), if deadline.is_some() => {
                    self.ensure_not_cancelled()?;
                    self.flush(&buffer, &mut coalescer);
                }
                next = events.next() => {
                    self.ensure_not_cancelled()?;
                    match next {
                        Some(Ok(StreamEvent::Content(chunk))) => {
                            buffer.push_str(&chunk);
                            coalescer.schedule();
                        }
                        Some(Ok(StreamEvent::Complete { filename })) => {
                            self.flush(&buffer, &mut coalescer);
                            return Ok(StreamOutcome {
                                text: buffer,
                                filename,
                                partial: false,
                            });
                        }
                        Some(Ok(StreamEvent::Error(message))) => {
                            return Err(StreamError::Server(message));
                        }
                        Some(Err(BackendError::Decode(message))) => {
                            return Err(StreamError::Malformed(message));
                        }
                        Some(Err(e)) => {
                            tracing::debug!(document_id = %self.document_id, error = %e, "Stream transport error");
                            return self.connection_lost(buffer, &mut coalescer);
                        }
                        None => return self.connection_lost(buffer, &mut coalescer),
                    }
                }
            }
        }
    }

    /// The connection ended without a terminal event. Keep partial content if any arrived.
    fn connection_lost(
        &self,
        buffer: String,
        coalescer: &mut Coalescer,
    ) -> Result<StreamOutcome, StreamError> {
        if buffer.is_empty() {
            return Err(StreamError::ConnectionLost);
        }

        tracing::warn!(
            document_id = %self.document_id,
            kind = %self.kind,
            chars = buffer.len(),
            "Connection lost after partial content, keeping what arrived"
        );
        self.flush(&buffer, coalescer);
        Ok(StreamOutcome {
            text: buffer,
            filename: None,
            partial: true,
        })
    }

    fn flush(&self, buffer: &str, coalescer: &mut Coalescer) {
        if coalescer.take_dirty(buffer.len()) {
            self.ctx.events.publish(EngineEvent::ContentFlushed {
                document_id: self.document_id.clone(),
                kind: self.kind,
                text: buffer.to_string(),
            });
        }
    }

    fn ensure_not_cancelled(&self) -> Result<(), StreamError> {
        if self.ctx.cancellations.is_cancelled(&self.document_id) {
            return Err(StreamError::Cancelled);
        }
        Ok(())
    }
}

async fn flush_due(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Fixed-window render throttle: the first unflushed chunk opens a window, and the
/// whole buffer is flushed once when it closes.
#[derive(Debug)]
struct Coalescer {
    window: Duration,
    deadline: Option<Instant>,
    flushed_len: usize,
}

impl Coalescer {
    fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
            flushed_len: 0,
        }
    }

    fn schedule(&mut self) {
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.window);
        }
    }

    /// Close the window. Returns whether the buffer grew since the last flush.
    fn take_dirty(&mut self, buffer_len: usize) -> bool {
        self.deadline = None;
        if buffer_len > self.flushed_len {
            self.flushed_len = buffer_len;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_coalescer_window_is_fixed() {
        let mut coalescer = Coalescer::new(Duration::from_millis(30));
        coalescer.schedule();
        let first = coalescer.deadline.unwrap();

        tokio::time::advance(Duration::from_millis(10)).await;
        coalescer.schedule();
        assert_eq!(coalescer.deadline, Some(first));

        assert!(coalescer.take_dirty(5));
        assert_eq!(coalescer.deadline, None);
        assert!(!coalescer.take_dirty(5));
        assert!(coalescer.take_dirty(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_due_without_deadline_never_fires() {
        let fired = tokio::time::timeout(Duration::from_secs(5), flush_due(None)).await;
        assert!(fired.is_err());

        let at = Instant::now() + Duration::from_millis(30);
        tokio::time::timeout(Duration::from_secs(5), flush_due(Some(at)))
            .await
            .unwrap();
    }
}
