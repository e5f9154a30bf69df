pub mod bedrock;
pub mod common;
pub mod gemini;

use std::sync::Arc;

use anyhow::Result;

pub use bedrock::BedrockAiBackend;
pub use common::AiBackend;
pub use gemini::GeminiAiBackend;

use crate::Settings;

/// Builds the backend named by `ai_backend` in the settings.
pub async fn from_settings(settings: &Settings) -> Result<Arc<dyn AiBackend>> {
    match settings.ai_backend.as_str() {
        "gemini" => {
            let api_key = settings.gemini_settings.api_key.clone();
            let Some(api_key) = api_key.filter(|key| !key.trim().is_empty()) else {
                anyhow::bail!(
                    "no Gemini API key: set gemini_settings.api_key or GOOGLE_API_KEY"
                );
            };
            Ok(Arc::new(GeminiAiBackend::new(&settings.gemini_settings, api_key)?))
        }
        "bedrock" => Ok(Arc::new(BedrockAiBackend::new(&settings.aws_settings).await)),
        other => anyhow::bail!("unknown ai_backend {other:?}, expected \"gemini\" or \"bedrock\""),
    }
}
