use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::common::AiBackend;
use crate::error::BackendError;
use crate::settings::GeminiSettings;

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

/// Google Gemini over the `generateContent` REST endpoint.
pub struct GeminiAiBackend {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiAiBackend {
    pub fn new(settings: &GeminiSettings, api_key: String) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("formula-relay/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        info!("Gemini backend configured with model {}", settings.model);
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_body(prompt: String) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: Some(prompt) }],
            }],
        }
    }

    /// Concatenates the text parts of the first candidate.
    fn completion_text(response: GenerateContentResponse) -> Result<String, BackendError> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::InvalidResponse("no candidates returned".into()))?;
        debug!("finish reason: {:?}", candidate.finish_reason);

        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        if text.is_empty() {
            return Err(BackendError::InvalidResponse(format!(
                "candidate carried no text (finish reason {:?})",
                candidate.finish_reason
            )));
        }
        Ok(text)
    }
}

fn map_status(status: StatusCode, body: String) -> BackendError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        BackendError::Unavailable(format!("HTTP {status}: {body}"))
    } else {
        BackendError::Rejected(format!("HTTP {status}: {body}"))
    }
}

fn map_reqwest_err(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout(e.to_string())
    } else if e.is_decode() {
        BackendError::InvalidResponse(e.to_string())
    } else {
        BackendError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl AiBackend for GeminiAiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn invoke(&self, prompt: String) -> Result<String, BackendError> {
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(prompt))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, body));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(map_reqwest_err)?;
        Self::completion_text(parsed)
    }
}
