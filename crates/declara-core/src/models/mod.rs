//! Data models for the client
//!
//! Queue items and their lifecycle, generated documents, and the wire shapes exchanged
//! with the generation backend.

mod api;
mod chat;
mod document;
mod queue;
mod stream;

// Re-export all models for convenient imports
pub use api::*;
pub use chat::*;
pub use document::*;
pub use queue::*;
pub use stream::*;
