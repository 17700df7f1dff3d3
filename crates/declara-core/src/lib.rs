//! Declara Core Library
//!
//! This crate provides the domain models, error types, configuration, validation and
//! pure helpers shared by the Declara client crates. It performs no I/O of its own;
//! the backend is reached through the [`GenerationBackend`] trait.

pub mod applicant;
pub mod backend;
pub mod config;
pub mod error;
pub mod format;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use applicant::{extract_applicant_name, DEFAULT_APPLICANT_NAME};
pub use backend::{EventStream, GenerationBackend};
pub use config::{AiProvider, ClientConfig, PreviewLimits, QueueLimits};
pub use error::{BackendError, ErrorMetadata, LogLevel, StreamError, ValidationError};
pub use format::format_file_size;
pub use validation::DocumentValidator;
