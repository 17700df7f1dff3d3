//! HTTP client for the Declara generation backend.
//!
//! Provides a minimal client with generic GET/POST/DELETE helpers, a server-sent events
//! decoder for the streaming endpoints, and domain methods (upload, generation streams,
//! chat, download of edited drafts). Implements [`GenerationBackend`] for the engine.
//!
//! Non-streaming requests carry the configured timeout. Streaming requests never time
//! out; they end when the server closes them or the caller drops the stream.

pub mod api;
pub mod sse;

use anyhow::{Context, Result};
use declara_core::{BackendError, ClientConfig};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP client for the generation backend.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: String, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(config.api_url.clone(), config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET request with optional query parameters. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, BackendError> {
        let mut request = self.client.get(self.build_url(path));
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = self.send(request).await?;
        decode_json(response).await
    }

    /// POST JSON body and return the raw response bytes (file downloads).
    pub async fn post_json_bytes<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<bytes::Bytes, BackendError> {
        let request = self.client.post(self.build_url(path)).json(body);
        let response = self.send(request).await?;
        response.bytes().await.map_err(transport)
    }

    /// POST multipart form and deserialize response.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, BackendError> {
        let request = self.client.post(self.build_url(path)).multipart(form);
        let response = self.send(request).await?;
        decode_json(response).await
    }

    /// DELETE request. Returns Ok(()) on success.
    pub async fn delete(&self, path: &str) -> Result<(), BackendError> {
        let request = self.client.delete(self.build_url(path));
        self.send(request).await?;
        Ok(())
    }

    /// Raw client for streaming requests, which must not carry the request timeout.
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(transport)?;
        ensure_success(response).await
    }
}

/// Turn a non-2xx response into [`BackendError::Http`] carrying the body text.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(BackendError::Http {
            status: status.as_u16(),
            body: error_text,
        });
    }

    Ok(response)
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let body = response.bytes().await.map_err(transport)?;
    serde_json::from_slice(&body).map_err(|e| BackendError::Decode(e.to_string()))
}

pub(crate) fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

pub use declara_core::models::{ProvidersResponse, UploadResponse};
