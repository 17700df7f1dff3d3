use serde::{Deserialize, Serialize};

use super::RemoteDocumentId;

/// Response of `POST /api/upload`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub document_id: Option<RemoteDocumentId>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Response of `GET /api/providers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidersResponse {
    pub success: bool,
    #[serde(default)]
    pub providers: Vec<String>,
    #[serde(default)]
    pub default_provider: Option<String>,
}

impl ProvidersResponse {
    /// What callers see when the provider list could not be fetched.
    pub fn unavailable() -> Self {
        Self {
            success: false,
            providers: Vec::new(),
            default_provider: None,
        }
    }
}

/// Body of `POST /api/download-edited/{id}/{type}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadEditedRequest {
    pub content: String,
}
