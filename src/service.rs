//! The formula-request service.
//!
//! [`FormulaRequestService::handle`] is the transport-level entry point: it
//! answers pre-flight probes, rejects unsupported methods, validates the body
//! and relays the prompt to the injected [`AiBackend`]. Every failure is turned
//! into a status plus an `{ "error": ... }` body before it leaves this module.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::ai_backend::AiBackend;
use crate::constants::{INVALID_BODY, PROMPT_REQUIRED};
use crate::error::{BackendError, FormulaError};
use crate::prompt::{compose_instruction, normalize_completion};
use crate::settings::InvocationSettings;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormulaRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Either a formula or an error, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormulaResponse {
    Formula { formula: String },
    Error { error: String },
}

/// Transport-neutral answer: a status and an optional JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReply {
    pub status: StatusCode,
    pub body: Option<FormulaResponse>,
}

/// How a single backend call is bounded and retried.
#[derive(Debug, Clone, Default)]
pub struct InvocationPolicy {
    pub timeout: Option<Duration>,
    /// Extra attempts after the first, for transient failures only.
    pub max_retries: u32,
    pub backoff: Duration,
}

impl From<&InvocationSettings> for InvocationPolicy {
    fn from(settings: &InvocationSettings) -> Self {
        Self {
            timeout: settings.timeout(),
            max_retries: settings.max_retries,
            backoff: Duration::from_millis(settings.retry_backoff_ms),
        }
    }
}

impl InvocationPolicy {
    /// Exponential backoff for retry `attempt` (1-based) with up to 50% jitter.
    fn delay(&self, attempt: u32) -> Duration {
        let base = self.backoff.saturating_mul(1 << attempt.saturating_sub(1).min(10));
        let jitter_ms = base.as_millis() as u64 / 2;
        if jitter_ms == 0 {
            return base;
        }
        base.saturating_add(Duration::from_millis(
            rand::thread_rng().gen_range(0..=jitter_ms),
        ))
    }
}

pub struct FormulaRequestService {
    backend: Arc<dyn AiBackend>,
    policy: InvocationPolicy,
}

impl FormulaRequestService {
    pub fn new(backend: Arc<dyn AiBackend>) -> Self {
        Self {
            backend,
            policy: InvocationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: InvocationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Answers one request on the formula endpoint.
    pub async fn handle(&self, method: &Method, body: &[u8]) -> ServiceReply {
        if method == Method::OPTIONS {
            return ServiceReply {
                status: StatusCode::OK,
                body: None,
            };
        }

        let result = if method == Method::POST {
            match parse_request(body) {
                Ok(request) => self.generate_formula(request).await,
                Err(e) => Err(e),
            }
        } else {
            Err(FormulaError::MethodNotAllowed)
        };

        match result {
            Ok(formula) => ServiceReply {
                status: StatusCode::OK,
                body: Some(FormulaResponse::Formula { formula }),
            },
            Err(e) => {
                match &e {
                    FormulaError::Backend(detail) => {
                        error!("Error calling {}: {detail}", self.backend.name())
                    }
                    other => info!("Rejected request on {method}: {other}"),
                }
                ServiceReply {
                    status: e.status(),
                    body: Some(FormulaResponse::Error {
                        error: e.client_message().to_string(),
                    }),
                }
            }
        }
    }

    /// Validates the prompt, relays it to the backend and returns the normalized formula.
    pub async fn generate_formula(&self, request: FormulaRequest) -> Result<String, FormulaError> {
        let prompt = request
            .prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .ok_or(FormulaError::ClientInput(PROMPT_REQUIRED))?;
        debug!("Prompt input is: {prompt}");

        let instruction = compose_instruction(&prompt);
        let completion = self.invoke_backend(instruction).await?;
        let formula = normalize_completion(&completion).ok_or_else(|| {
            BackendError::InvalidResponse("completion was empty after trimming".into())
        })?;
        debug!("Formula is: {formula}");
        Ok(formula)
    }

    async fn invoke_backend(&self, instruction: String) -> Result<String, BackendError> {
        let mut attempt = 0;
        loop {
            match self.invoke_once(instruction.clone()).await {
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = self.policy.delay(attempt);
                    warn!("Transient backend failure ({e}), retry {attempt} in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn invoke_once(&self, instruction: String) -> Result<String, BackendError> {
        match self.policy.timeout {
            Some(limit) => tokio::time::timeout(limit, self.backend.invoke(instruction))
                .await
                .map_err(|_| BackendError::Timeout(format!("no completion within {limit:?}")))?,
            None => self.backend.invoke(instruction).await,
        }
    }
}

fn parse_request(body: &[u8]) -> Result<FormulaRequest, FormulaError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(FormulaRequest::default());
    }
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
        debug!("Unparseable body: {e}");
        FormulaError::ClientInput(INVALID_BODY)
    })?;
    if !value.is_object() {
        return Err(FormulaError::ClientInput(INVALID_BODY));
    }
    serde_json::from_value(value).map_err(|e| {
        debug!("Unexpected body shape: {e}");
        FormulaError::ClientInput(INVALID_BODY)
    })
}
