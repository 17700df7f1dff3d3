//! Conversational edits of a generated document.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use declara_core::models::{
    chat_user_id, ApplyOutcome, ChatEvent, ChatReply, ChatRequest, ChatTurn, DocumentKind,
    RemoteDocumentId,
};
use declara_core::{BackendError, StreamError};
use futures::StreamExt;

use crate::context::EngineContext;
use crate::error::EngineError;
use crate::events::EngineEvent;

/// Rewrites shorter than this share of the current text need confirmation...
const SHRINK_RATIO: f64 = 0.3;
/// ...but only once the current text is longer than this many characters.
const SHRINK_CHECK_MIN_CHARS: usize = 500;

#[derive(Clone)]
pub struct ChatSession {
    ctx: Arc<EngineContext>,
    history: Arc<Mutex<HashMap<RemoteDocumentId, Vec<ChatTurn>>>>,
}

impl ChatSession {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self {
            ctx,
            history: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Ask the assistant about one artifact of a document and stream its reply.
    ///
    /// Undecodable payloads are skipped. A stream that ends without a `complete` event
    /// still yields what arrived; an `error` event or a dropped connection does not.
    #[tracing::instrument(skip(self, message), fields(document_id = %document_id, kind = %kind))]
    pub async fn send(
        &self,
        document_id: &RemoteDocumentId,
        kind: DocumentKind,
        message: &str,
    ) -> Result<ChatReply, EngineError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(BackendError::InvalidRequest("Chat message must not be empty".into()).into());
        }

        self.push(document_id, ChatTurn::user(message));
        let request = ChatRequest::new(document_id, kind, message);
        let mut events = self
            .ctx
            .backend
            .open_chat(&request)
            .await
            .map_err(StreamError::from)?;

        let mut text = String::new();
        let mut modified_text = None;

        while let Some(next) = events.next().await {
            match next {
                Ok(ChatEvent::Content(chunk)) => {
                    text.push_str(&chunk);
                    self.ctx.events.publish(EngineEvent::ChatChunk {
                        document_id: document_id.clone(),
                        text: chunk,
                    });
                }
                Ok(ChatEvent::Complete {
                    has_modification,
                    modified_text: proposed,
                }) => {
                    if has_modification {
                        modified_text = proposed;
                    }
                }
                Ok(ChatEvent::Error(message)) => {
                    tracing::warn!(error = %message, "Assistant returned an error");
                    return Err(StreamError::Server(message).into());
                }
                Err(BackendError::Decode(e)) => {
                    tracing::warn!(error = %e, "Skipping undecodable chat event");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Chat stream failed");
                    return Err(StreamError::ConnectionLost.into());
                }
            }
        }

        self.push(document_id, ChatTurn::assistant(text.clone()));
        tracing::debug!(chars = text.len(), has_modification = modified_text.is_some(), "Chat reply received");
        Ok(ChatReply {
            text,
            modified_text,
        })
    }

    /// Replace the document's content with a rewrite proposed by the assistant.
    ///
    /// A rewrite much shorter than a long current text is likely a fragment and is not
    /// applied unless `confirmed`.
    pub fn apply_modification(
        &self,
        document_id: &RemoteDocumentId,
        kind: DocumentKind,
        modified_text: &str,
        confirmed: bool,
    ) -> Result<ApplyOutcome, EngineError> {
        if modified_text.is_empty() {
            return Err(EngineError::EmptyModification);
        }

        let doc = self
            .ctx
            .documents
            .get(document_id)
            .ok_or_else(|| EngineError::DocumentNotFound(document_id.clone()))?;
        let current_len = doc.content(kind).map_or(0, |c| c.chars().count());
        let modified_len = modified_text.chars().count();

        if !confirmed && needs_confirmation(current_len, modified_len) {
            return Ok(ApplyOutcome::NeedsConfirmation {
                current_len,
                modified_len,
            });
        }

        self.ctx
            .documents
            .apply_edit(document_id, kind, modified_text.to_string())?;
        tracing::info!(document_id = %document_id, kind = %kind, "Chat modification applied");
        Ok(ApplyOutcome::Applied)
    }

    /// Forget the conversation on both sides.
    pub async fn clear_memory(&self, document_id: &RemoteDocumentId) -> Result<(), EngineError> {
        self.ctx
            .backend
            .clear_chat_memory(&chat_user_id(document_id))
            .await?;
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(document_id);
        Ok(())
    }

    pub fn history(&self, document_id: &RemoteDocumentId) -> Vec<ChatTurn> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(document_id)
            .cloned()
            .unwrap_or_default()
    }

    fn push(&self, document_id: &RemoteDocumentId, turn: ChatTurn) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(document_id.clone())
            .or_default()
            .push(turn);
    }
}

fn needs_confirmation(current_len: usize, modified_len: usize) -> bool {
    current_len > SHRINK_CHECK_MIN_CHARS && (modified_len as f64) < current_len as f64 * SHRINK_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::offline_context;

    #[test]
    fn test_needs_confirmation_threshold() {
        assert!(needs_confirmation(1000, 299));
        assert!(!needs_confirmation(1000, 300));
        assert!(!needs_confirmation(500, 10));
        assert!(needs_confirmation(501, 10));
    }

    #[test]
    fn test_apply_modification_guards_short_rewrites() {
        let ctx = offline_context();
        let chat = ChatSession::new(ctx.clone());
        let id = RemoteDocumentId::new("3");
        ctx.documents
            .store_declaration(&id, "a.pdf", "x".repeat(1000), None);

        let outcome = chat
            .apply_modification(&id, DocumentKind::Declaration, "short", false)
            .unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::NeedsConfirmation {
                current_len: 1000,
                modified_len: 5
            }
        );
        assert_eq!(ctx.documents.get(&id).unwrap().declaration_content.len(), 1000);

        let outcome = chat
            .apply_modification(&id, DocumentKind::Declaration, "short", true)
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(ctx.documents.get(&id).unwrap().declaration_content, "short");
    }

    #[test]
    fn test_apply_modification_errors() {
        let ctx = offline_context();
        let chat = ChatSession::new(ctx);
        let id = RemoteDocumentId::new("3");

        assert!(matches!(
            chat.apply_modification(&id, DocumentKind::Declaration, "", true),
            Err(EngineError::EmptyModification)
        ));
        assert!(matches!(
            chat.apply_modification(&id, DocumentKind::Declaration, "text", true),
            Err(EngineError::DocumentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_locally() {
        let chat = ChatSession::new(offline_context());
        let err = chat
            .send(&RemoteDocumentId::new("1"), DocumentKind::Cover, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Backend(BackendError::InvalidRequest(_))));
        assert!(chat.history(&RemoteDocumentId::new("1")).is_empty());
    }
}
