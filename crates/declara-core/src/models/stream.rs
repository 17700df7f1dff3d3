use serde::Deserialize;

use crate::error::BackendError;

/// One decoded event of a generation stream (declaration or cover letter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Content(String),
    Complete { filename: Option<String> },
    Error(String),
}

/// One decoded event of a chat stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Content(String),
    Complete {
        has_modification: bool,
        modified_text: Option<String>,
    },
    Error(String),
}

/// Decoding of a single `data:` payload into a typed event.
///
/// `Ok(None)` means the payload is well-formed but carries nothing to act on
/// (an empty chunk, or an event type this client does not know).
pub trait StreamPayload: Sized + Send + 'static {
    /// Whether an undecodable payload ends the stream. When false the payload is
    /// yielded as a `Decode` error and reading continues.
    const MALFORMED_ENDS_STREAM: bool = true;

    fn from_data(data: &str) -> Result<Option<Self>, BackendError>;
}

/// Union of every field the backend puts in an event payload.
#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: Option<String>,
    chunk: Option<String>,
    filename: Option<String>,
    error: Option<String>,
    #[serde(default)]
    has_modification: bool,
    modified_text: Option<String>,
}

impl RawEvent {
    fn parse(data: &str) -> Result<Self, BackendError> {
        serde_json::from_str(data).map_err(|e| BackendError::Decode(e.to_string()))
    }

    /// Any payload carrying an `error` field is an error, whatever its type says.
    fn error_message(&self) -> Option<String> {
        match (self.kind.as_deref(), &self.error) {
            (_, Some(err)) => Some(err.clone()),
            (Some("error"), None) => Some("Processing error".to_string()),
            _ => None,
        }
    }
}

impl StreamPayload for StreamEvent {
    fn from_data(data: &str) -> Result<Option<Self>, BackendError> {
        let raw = RawEvent::parse(data)?;
        if let Some(message) = raw.error_message() {
            return Ok(Some(StreamEvent::Error(message)));
        }

        Ok(match raw.kind.as_deref() {
            Some("content") => raw
                .chunk
                .filter(|c| !c.is_empty())
                .map(StreamEvent::Content),
            Some("complete") => Some(StreamEvent::Complete {
                filename: raw.filename,
            }),
            _ => None,
        })
    }
}

impl StreamPayload for ChatEvent {
    const MALFORMED_ENDS_STREAM: bool = false;

    fn from_data(data: &str) -> Result<Option<Self>, BackendError> {
        let raw = RawEvent::parse(data)?;
        if raw.kind.as_deref() == Some("error") {
            let message = raw
                .error
                .unwrap_or_else(|| "Error in chat response".to_string());
            return Ok(Some(ChatEvent::Error(message)));
        }

        Ok(match raw.kind.as_deref() {
            Some("content") => raw.chunk.filter(|c| !c.is_empty()).map(ChatEvent::Content),
            Some("complete") => Some(ChatEvent::Complete {
                has_modification: raw.has_modification,
                modified_text: raw.modified_text.filter(|t| !t.is_empty()),
            }),
            _ => None,
        })
    }
}
