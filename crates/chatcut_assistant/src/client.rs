use async_trait::async_trait;
use chatcut_core::config::AssistantConfig;
use chatcut_core::types::Media;
use reqwest::multipart::{Form, Part};
use std::time::Duration;

use crate::error::{AssistantError, Result};
use crate::protocol::{AssistantRequest, AssistantResponse, PreprocessResponse};

/// The conversational service that turns chat into edit function calls.
#[async_trait]
pub trait AssistantEndpoint: Send + Sync {
    async fn send(&self, request: &AssistantRequest) -> Result<AssistantResponse>;
}

/// Produces per-second annotations for a freshly ingested video.
#[async_trait]
pub trait Preprocessor: Send + Sync {
    async fn preprocess(&self, media: &Media) -> Result<PreprocessResponse>;
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

async fn check_status(endpoint: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AssistantError::Status {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    })
}

// ---------------------------------------------------------------------------
// Assistant
// ---------------------------------------------------------------------------

pub struct HttpAssistant {
    client: reqwest::Client,
    url: String,
}

impl HttpAssistant {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
        })
    }

    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        Self::new(
            config.chat_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[async_trait]
impl AssistantEndpoint for HttpAssistant {
    async fn send(&self, request: &AssistantRequest) -> Result<AssistantResponse> {
        tracing::debug!(url = %self.url, kind = ?request.request_type, task_id = ?request.task_id, "Sending assistant request");
        let response = self.client.post(&self.url).json(request).send().await?;
        let response = check_status("assistant", response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

// ---------------------------------------------------------------------------
// Preprocessor
// ---------------------------------------------------------------------------

pub struct HttpPreprocessor {
    client: reqwest::Client,
    url: String,
}

impl HttpPreprocessor {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
        })
    }

    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        Self::new(
            config.preprocess_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[async_trait]
impl Preprocessor for HttpPreprocessor {
    async fn preprocess(&self, media: &Media) -> Result<PreprocessResponse> {
        let bytes = tokio::fs::read(&media.source).await?;
        let video = Part::bytes(bytes)
            .file_name(media.name.clone())
            .mime_str(&media.content_type)?;
        let form = Form::new()
            .part("video", video)
            .text("duration", media.duration_us.as_seconds().to_string());

        tracing::info!(media_id = %media.id, url = %self.url, "Preprocessing media");
        let response = self.client.post(&self.url).multipart(form).send().await?;
        let response = check_status("preprocess", response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
