//! Error types module
//!
//! Three families of errors flow through the client:
//! - [`ValidationError`]: a file was refused by the queue and never entered it.
//! - [`BackendError`]: a request to the generation backend failed.
//! - [`StreamError`]: a generation stream settled without a usable result.
//!
//! All three implement [`ErrorMetadata`] so the engine can decide how loudly to report them.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected outcomes like user cancellation
    Debug,
    /// Warning level - for user mistakes and recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Describes how an error should be presented and reported
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "QUEUE_FULL")
    fn error_code(&self) -> &'static str;

    /// Whether retrying (or regenerating) can succeed
    fn is_recoverable(&self) -> bool;

    /// User-facing message
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Reasons a file is refused by the queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Maximum limit reached: You can only upload up to {max} documents at a time.")]
    QueueFull { max: usize },

    #[error("File \"{file_name}\" is already in the queue.")]
    Duplicate { file_name: String },

    #[error("Invalid file type: {file_name}. Please upload DOCX, PDF or TXT files.")]
    InvalidExtension { file_name: String },

    #[error("File {file_name} exceeds {max_mb}MB limit.")]
    FileTooLarge { file_name: String, max_mb: u64 },
}

impl ValidationError {
    pub fn file_name(&self) -> Option<&str> {
        match self {
            ValidationError::QueueFull { .. } => None,
            ValidationError::Duplicate { file_name }
            | ValidationError::InvalidExtension { file_name }
            | ValidationError::FileTooLarge { file_name, .. } => Some(file_name),
        }
    }
}

impl ErrorMetadata for ValidationError {
    fn error_code(&self) -> &'static str {
        match self {
            ValidationError::QueueFull { .. } => "QUEUE_FULL",
            ValidationError::Duplicate { .. } => "DUPLICATE_FILE",
            ValidationError::InvalidExtension { .. } => "INVALID_EXTENSION",
            ValidationError::FileTooLarge { .. } => "FILE_TOO_LARGE",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, ValidationError::QueueFull { .. })
    }

    fn client_message(&self) -> String {
        self.to_string()
    }

    fn log_level(&self) -> LogLevel {
        LogLevel::Warn
    }
}

/// Failures talking to the generation backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("API request failed with status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Upload response did not contain a document id")]
    MissingDocumentId,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl BackendError {
    /// Pulls a human readable message out of a FastAPI style `{"detail": ...}` body.
    pub fn detail(&self) -> Option<String> {
        match self {
            BackendError::Http { body, .. } => serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string)),
            _ => None,
        }
    }
}

impl ErrorMetadata for BackendError {
    fn error_code(&self) -> &'static str {
        match self {
            BackendError::Http { .. } => "BACKEND_HTTP_ERROR",
            BackendError::Transport(_) => "BACKEND_UNREACHABLE",
            BackendError::Decode(_) => "BACKEND_DECODE_ERROR",
            BackendError::MissingDocumentId => "MISSING_DOCUMENT_ID",
            BackendError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            BackendError::Http { status, .. } => *status >= 500 || *status == 429,
            BackendError::Transport(_) => true,
            _ => false,
        }
    }

    fn client_message(&self) -> String {
        match self {
            BackendError::Http { status, .. } => self
                .detail()
                .unwrap_or_else(|| format!("Request failed with status {}", status)),
            BackendError::Transport(_) => "Could not reach the server".to_string(),
            BackendError::Decode(_) | BackendError::MissingDocumentId => {
                "Unexpected response from the server".to_string()
            }
            BackendError::InvalidRequest(msg) => msg.clone(),
        }
    }

    fn log_level(&self) -> LogLevel {
        LogLevel::Error
    }
}

/// How a generation or chat stream failed to produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The owning document was cancelled by the user.
    #[error("Stream cancelled")]
    Cancelled,

    /// Structured `{"type": "error"}` event from the server.
    #[error("{0}")]
    Server(String),

    /// The connection dropped before any content arrived.
    #[error("Connection lost")]
    ConnectionLost,

    #[error("Failed to open stream: {0}")]
    Open(#[source] BackendError),

    #[error("Malformed stream event: {0}")]
    Malformed(String),
}

impl StreamError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, StreamError::Cancelled)
    }
}

impl From<BackendError> for StreamError {
    fn from(err: BackendError) -> Self {
        StreamError::Open(err)
    }
}

impl ErrorMetadata for StreamError {
    fn error_code(&self) -> &'static str {
        match self {
            StreamError::Cancelled => "CANCELLED",
            StreamError::Server(_) => "GENERATION_FAILED",
            StreamError::ConnectionLost => "CONNECTION_LOST",
            StreamError::Open(inner) => inner.error_code(),
            StreamError::Malformed(_) => "MALFORMED_EVENT",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, StreamError::Cancelled)
    }

    fn client_message(&self) -> String {
        match self {
            StreamError::Open(inner) => inner.client_message(),
            other => other.to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            StreamError::Cancelled => LogLevel::Debug,
            StreamError::ConnectionLost => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}
