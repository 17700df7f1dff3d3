use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DocumentKind, RemoteDocumentId};

/// Body of `POST /api/chat/stream`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub document_id: RemoteDocumentId,
    pub document_type: DocumentKind,
    pub user_id: String,
}

impl ChatRequest {
    pub fn new(
        document_id: &RemoteDocumentId,
        document_type: DocumentKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            document_id: document_id.clone(),
            document_type,
            user_id: chat_user_id(document_id),
        }
    }
}

/// Chat memory on the backend is scoped per document.
pub fn chat_user_id(document_id: &RemoteDocumentId) -> String {
    format!("user_{}", document_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// Final assistant reply. `modified_text` is set only when the assistant proposes a rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
    pub modified_text: Option<String>,
}

/// Result of applying a proposed rewrite to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The rewrite is much shorter than the current text and needs explicit confirmation.
    NeedsConfirmation {
        current_len: usize,
        modified_len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_serialization() {
        let req = ChatRequest::new(
            &RemoteDocumentId::new("9"),
            DocumentKind::Cover,
            "Make it shorter",
        );
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["user_id"], "user_9");
        assert_eq!(json["document_id"], 9);
        assert_eq!(json["document_type"], "cover");
        assert_eq!(json["message"], "Make it shorter");
    }
}
