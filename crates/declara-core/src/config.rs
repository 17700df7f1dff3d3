//! Configuration module
//!
//! Client settings are read from the environment (and an optional `.env` file) once at
//! startup. Every key has a default so the client runs against a local backend out of the box.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_API_URL: &str = "http://localhost:8000";
const MAX_DOCUMENTS: usize = 5;
const MAX_FILE_SIZE_MB: u64 = 10;
const VALID_EXTENSIONS: &str = "docx,doc,pdf,txt";
const TYPING_EFFECT_DELAY_MS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const PDF_PREVIEW_MAX_PAGES: usize = 2;
const TEXT_PREVIEW_MAX_CHARS: usize = 5000;
const EVENT_BUS_CAPACITY: usize = 1024;

/// AI provider the backend should generate with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiProvider {
    #[default]
    GoogleGemini,
    GroqAi,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::GoogleGemini => "google_gemini",
            AiProvider::GroqAi => "groq_ai",
        }
    }
}

impl Display for AiProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google_gemini" => Ok(AiProvider::GoogleGemini),
            "groq_ai" => Ok(AiProvider::GroqAi),
            _ => Err(anyhow::anyhow!("Invalid AI provider: {}", s)),
        }
    }
}

/// Queue admission rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueLimits {
    pub max_documents: usize,
    pub max_file_size_mb: u64,
    /// Lowercased, without the leading dot
    pub valid_extensions: Vec<String>,
}

impl QueueLimits {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            max_documents: MAX_DOCUMENTS,
            max_file_size_mb: MAX_FILE_SIZE_MB,
            valid_extensions: split_list(VALID_EXTENSIONS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewLimits {
    pub pdf_max_pages: usize,
    pub text_max_chars: usize,
}

impl Default for PreviewLimits {
    fn default() -> Self {
        Self {
            pdf_max_pages: PDF_PREVIEW_MAX_PAGES,
            text_max_chars: TEXT_PREVIEW_MAX_CHARS,
        }
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub ai_provider: AiProvider,
    pub queue: QueueLimits,
    pub preview: PreviewLimits,
    /// Coalescing window for streamed content
    pub typing_effect_delay: Duration,
    /// Timeout for non-streaming requests. Streams are never timed out.
    pub request_timeout: Duration,
    pub event_bus_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ai_provider: AiProvider::default(),
            queue: QueueLimits::default(),
            preview: PreviewLimits::default(),
            typing_effect_delay: Duration::from_millis(TYPING_EFFECT_DELAY_MS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            event_bus_capacity: EVENT_BUS_CAPACITY,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let api_url = env::var("DECLARA_API_URL")
            .or_else(|_| env::var("API_URL"))
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let ai_provider = match env::var("DECLARA_AI_PROVIDER") {
            Ok(value) => value.parse()?,
            Err(_) => AiProvider::default(),
        };

        let queue = QueueLimits {
            max_documents: env::var("MAX_DOCUMENTS")
                .unwrap_or_else(|_| MAX_DOCUMENTS.to_string())
                .parse()
                .unwrap_or(MAX_DOCUMENTS),
            max_file_size_mb: env::var("MAX_FILE_SIZE_MB")
                .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
                .parse()
                .unwrap_or(MAX_FILE_SIZE_MB),
            valid_extensions: split_list(
                &env::var("VALID_EXTENSIONS").unwrap_or_else(|_| VALID_EXTENSIONS.to_string()),
            ),
        };

        let preview = PreviewLimits {
            pdf_max_pages: env::var("PDF_PREVIEW_MAX_PAGES")
                .unwrap_or_else(|_| PDF_PREVIEW_MAX_PAGES.to_string())
                .parse()
                .unwrap_or(PDF_PREVIEW_MAX_PAGES),
            text_max_chars: env::var("TEXT_PREVIEW_MAX_CHARS")
                .unwrap_or_else(|_| TEXT_PREVIEW_MAX_CHARS.to_string())
                .parse()
                .unwrap_or(TEXT_PREVIEW_MAX_CHARS),
        };

        let config = Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            ai_provider,
            queue,
            preview,
            typing_effect_delay: Duration::from_millis(
                env::var("TYPING_EFFECT_DELAY_MS")
                    .unwrap_or_else(|_| TYPING_EFFECT_DELAY_MS.to_string())
                    .parse()
                    .unwrap_or(TYPING_EFFECT_DELAY_MS),
            ),
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| REQUEST_TIMEOUT_SECS.to_string())
                    .parse()
                    .unwrap_or(REQUEST_TIMEOUT_SECS),
            ),
            event_bus_capacity: env::var("EVENT_BUS_CAPACITY")
                .unwrap_or_else(|_| EVENT_BUS_CAPACITY.to_string())
                .parse()
                .unwrap_or(EVENT_BUS_CAPACITY),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.queue.max_documents == 0 {
            return Err(anyhow::anyhow!("MAX_DOCUMENTS must be greater than zero"));
        }

        if self.queue.max_file_size_mb == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than zero"));
        }

        if self.queue.valid_extensions.is_empty() {
            return Err(anyhow::anyhow!(
                "VALID_EXTENSIONS must list at least one extension"
            ));
        }

        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "DECLARA_API_URL must be an http:// or https:// URL"
            ));
        }

        if self.event_bus_capacity == 0 {
            return Err(anyhow::anyhow!(
                "EVENT_BUS_CAPACITY must be greater than zero"
            ));
        }

        Ok(())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
