//! Domain methods for the Declara API client.

use async_trait::async_trait;
use bytes::Bytes;
use declara_core::models::{
    ChatEvent, ChatRequest, DocumentKind, DownloadEditedRequest, ProvidersResponse,
    RemoteDocumentId, StreamEvent, StreamPayload, UploadResponse,
};
use declara_core::{AiProvider, BackendError, EventStream, GenerationBackend};

use crate::sse::decode_events;
use crate::{ensure_success, transport, ApiClient};

/// Path of the generation stream for one artifact.
pub fn generation_path(document_id: &RemoteDocumentId, kind: DocumentKind) -> String {
    let id = urlencoding::encode(document_id.as_str());
    match kind {
        DocumentKind::Declaration => format!("/api/process/{}/stream", id),
        DocumentKind::Cover => format!("/api/generate-cover-letter/{}/stream", id),
    }
}

impl ApiClient {
    /// Upload a source document as multipart `file`.
    pub async fn upload_document(
        &self,
        file_name: &str,
        bytes: Bytes,
    ) -> Result<UploadResponse, BackendError> {
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes.to_vec()).file_name(file_name.to_string()),
        );

        self.post_multipart("/api/upload", form).await
    }

    pub async fn providers(&self) -> Result<ProvidersResponse, BackendError> {
        self.get("/api/providers", &[]).await
    }

    /// Open an SSE stream with a GET request.
    pub async fn stream_get<T: StreamPayload>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<EventStream<T>, BackendError> {
        let mut request = self
            .client()
            .get(self.build_url(path))
            .header(reqwest::header::ACCEPT, "text/event-stream");
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.map_err(transport)?;
        let response = ensure_success(response).await?;
        Ok(decode_events(response))
    }

    /// Open an SSE stream with a POSTed JSON body.
    pub async fn stream_post<T: StreamPayload, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<EventStream<T>, BackendError> {
        let response = self
            .client()
            .post(self.build_url(path))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        let response = ensure_success(response).await?;
        Ok(decode_events(response))
    }

    pub async fn download_edited_document(
        &self,
        document_id: &RemoteDocumentId,
        kind: DocumentKind,
        content: &str,
    ) -> Result<Bytes, BackendError> {
        let path = format!(
            "/api/download-edited/{}/{}",
            urlencoding::encode(document_id.as_str()),
            kind.as_str()
        );
        let body = DownloadEditedRequest {
            content: content.to_string(),
        };

        self.post_json_bytes(&path, &body).await
    }
}

#[async_trait]
impl GenerationBackend for ApiClient {
    async fn upload(&self, file_name: &str, bytes: Bytes) -> Result<RemoteDocumentId, BackendError> {
        let response = self.upload_document(file_name, bytes).await?;
        tracing::debug!(
            file_name = %file_name,
            document_id = ?response.document_id,
            "Upload response received"
        );
        response.document_id.ok_or(BackendError::MissingDocumentId)
    }

    async fn open_generation(
        &self,
        document_id: &RemoteDocumentId,
        kind: DocumentKind,
        provider: AiProvider,
    ) -> Result<EventStream<StreamEvent>, BackendError> {
        let path = generation_path(document_id, kind);
        self.stream_get(&path, &[("ai_provider", provider.to_string())])
            .await
    }

    async fn open_chat(&self, request: &ChatRequest) -> Result<EventStream<ChatEvent>, BackendError> {
        if request.message.trim().is_empty() {
            return Err(BackendError::InvalidRequest(
                "Chat message cannot be empty".to_string(),
            ));
        }

        self.stream_post("/api/chat/stream", request).await
    }

    async fn download_edited(
        &self,
        document_id: &RemoteDocumentId,
        kind: DocumentKind,
        content: &str,
    ) -> Result<Bytes, BackendError> {
        self.download_edited_document(document_id, kind, content)
            .await
    }

    async fn list_providers(&self) -> Result<ProvidersResponse, BackendError> {
        self.providers().await
    }

    async fn clear_chat_memory(&self, user_id: &str) -> Result<(), BackendError> {
        self.delete(&format!(
            "/api/chat/memory/{}",
            urlencoding::encode(user_id)
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_paths() {
        let id = RemoteDocumentId::new("12");
        assert_eq!(
            generation_path(&id, DocumentKind::Declaration),
            "/api/process/12/stream"
        );
        assert_eq!(
            generation_path(&id, DocumentKind::Cover),
            "/api/generate-cover-letter/12/stream"
        );
    }
}
