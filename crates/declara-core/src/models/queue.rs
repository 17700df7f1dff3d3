use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::RemoteDocumentId;
use crate::format::format_file_size;

/// Locally generated identifier of a queue item.
///
/// Backed by a UUIDv7, so ids sort by creation time and never collide within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueItemId(Uuid);

impl QueueItemId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for QueueItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for QueueItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a queue item.
///
/// ```text
/// pending --upload--> uploading --ok--> uploaded --start--> processing --done--> completed
///                          \--fail--> error                      \--fail--> error
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Uploading,
    Uploaded,
    Processing,
    Completed,
    Error,
}

impl QueueStatus {
    /// Whether "process all" picks this item up.
    pub fn is_eligible(&self) -> bool {
        matches!(self, QueueStatus::Pending | QueueStatus::Uploaded)
    }

    /// Label shown next to the item in the queue list.
    pub fn label(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "Pending",
            QueueStatus::Uploading => "Uploading...",
            QueueStatus::Uploaded => "Ready",
            QueueStatus::Processing => "Processing...",
            QueueStatus::Completed => "✓ Completed",
            QueueStatus::Error => "Error",
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// `Uploaded` is reachable from `Processing`, `Completed` and `Error` because closing a
    /// document resets its item so it can be generated again.
    pub fn can_transition_to(&self, next: QueueStatus) -> bool {
        use QueueStatus::*;
        match (self, next) {
            (Pending, Uploading) | (Pending, Uploaded) | (Pending, Error) => true,
            (Uploading, Uploaded) | (Uploading, Error) => true,
            (Uploaded, Processing) | (Uploaded, Error) => true,
            (Processing, Completed) | (Processing, Error) => true,
            (Processing, Uploaded) | (Completed, Uploaded) | (Error, Uploaded) => true,
            _ => false,
        }
    }

}

impl Display for QueueStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            QueueStatus::Pending => write!(f, "pending"),
            QueueStatus::Uploading => write!(f, "uploading"),
            QueueStatus::Uploaded => write!(f, "uploaded"),
            QueueStatus::Processing => write!(f, "processing"),
            QueueStatus::Completed => write!(f, "completed"),
            QueueStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for QueueStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "uploading" => Ok(QueueStatus::Uploading),
            "uploaded" => Ok(QueueStatus::Uploaded),
            "processing" => Ok(QueueStatus::Processing),
            "completed" => Ok(QueueStatus::Completed),
            "error" => Ok(QueueStatus::Error),
            _ => Err(anyhow::anyhow!("Invalid queue status: {}", s)),
        }
    }
}

/// A file picked by the user, before it enters the queue.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Lowercased extension of `file_name` including the leading dot.
pub fn file_extension(file_name: &str) -> Option<String> {
    file_name
        .rfind('.')
        .map(|idx| file_name[idx..].to_lowercase())
        .filter(|ext| ext.len() > 1)
}

/// Local-only preview state. Independent of the processing status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewState {
    pub expanded: bool,
    pub rendered: bool,
    pub content: Option<String>,
}

/// One file tracked through upload and generation.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: QueueItemId,
    pub file: Bytes,
    pub file_name: String,
    pub file_size_bytes: u64,
    pub file_size_display: String,
    pub status: QueueStatus,
    pub remote_document_id: Option<RemoteDocumentId>,
    pub preview: PreviewState,
    pub added_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn from_source(file: SourceFile) -> Self {
        let size = file.size();
        Self {
            id: QueueItemId::new(),
            file_size_bytes: size,
            file_size_display: format_file_size(size),
            file_name: file.name,
            file: file.bytes,
            status: QueueStatus::Pending,
            remote_document_id: None,
            preview: PreviewState::default(),
            added_at: Utc::now(),
        }
    }

    /// Upper-cased extension without the dot, as shown on the queue badge.
    pub fn extension_badge(&self) -> String {
        file_extension(&self.file_name)
            .map(|ext| ext.trim_start_matches('.').to_uppercase())
            .unwrap_or_default()
    }

    /// The preview toggle is hidden while the item is being generated or is done.
    pub fn can_preview(&self) -> bool {
        !self.file.is_empty()
            && !matches!(
                self.status,
                QueueStatus::Completed | QueueStatus::Processing
            )
    }
}
