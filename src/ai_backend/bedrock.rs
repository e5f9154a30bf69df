use std::fmt::Debug;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_bedrockruntime::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, ConverseStreamOutput, Message,
};
use aws_sdk_bedrockruntime::Client;
use tracing::{debug, info};

use super::common::AiBackend;
use crate::error::BackendError;
use crate::settings::AwsSettings;

const TRANSIENT_CODES: &[&str] = &[
    "ThrottlingException",
    "ServiceUnavailableException",
    "InternalServerException",
    "ModelNotReadyException",
];

/// Amazon Bedrock through the Converse stream API.
pub struct BedrockAiBackend {
    client: Client,
    model_id: String,
}

impl BedrockAiBackend {
    /// Resolves AWS credentials once; the client is reused by every request.
    pub async fn new(settings: &AwsSettings) -> Self {
        info!("Using region: {}", settings.region);
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));
        if let Some(profile) = &settings.profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;
        info!("Creating bedrock client for model {}", settings.model_id);
        Self {
            client: Client::new(&sdk_config),
            model_id: settings.model_id.clone(),
        }
    }

    fn get_converse_output_text(output: ConverseStreamOutput) -> String {
        match output {
            ConverseStreamOutput::ContentBlockDelta(event) => match event.delta() {
                Some(delta) => {
                    debug!("{:?}", delta);
                    delta.as_text().cloned().unwrap_or_default()
                }
                None => String::new(),
            },
            // rest log and return empty string
            ConverseStreamOutput::MessageStop(e) => {
                debug!("MessageStop: {:?}", e);
                String::new()
            }
            ConverseStreamOutput::Metadata(e) => {
                debug!("Metadata: {:?}", e);
                String::new()
            }
            other => {
                debug!("Received non-content event: {:?}", other);
                String::new()
            }
        }
    }
}

fn classify_sdk_error<E, R>(err: SdkError<E, R>) -> BackendError
where
    E: ProvideErrorMetadata + Debug,
    R: Debug,
{
    match &err {
        SdkError::TimeoutError(_) => BackendError::Timeout(format!("{err:?}")),
        SdkError::DispatchFailure(_) => BackendError::Unavailable(format!("{err:?}")),
        SdkError::ServiceError(service) => {
            let source = service.err();
            let code = source.code().unwrap_or("Unknown");
            let message = format!(
                "{code}: {}",
                source.message().unwrap_or("Unable to see service error message")
            );
            classify_code(code, message)
        }
        _ => BackendError::Unavailable(format!("{err:?}")),
    }
}

fn classify_code(code: &str, message: String) -> BackendError {
    if code == "ModelTimeoutException" {
        BackendError::Timeout(message)
    } else if TRANSIENT_CODES.contains(&code) {
        BackendError::Unavailable(message)
    } else {
        BackendError::Rejected(message)
    }
}

#[async_trait]
impl AiBackend for BedrockAiBackend {
    fn name(&self) -> &str {
        "bedrock"
    }

    async fn invoke(&self, prompt: String) -> Result<String, BackendError> {
        let message = Message::builder()
            .role(ConversationRole::User)
            .content(ContentBlock::Text(prompt))
            .build()
            .map_err(|e| BackendError::Rejected(format!("failed to build message: {e}")))?;

        let response = self
            .client
            .converse_stream()
            .model_id(&self.model_id)
            .messages(message)
            .send()
            .await
            .map_err(classify_sdk_error)?;
        debug!("Response received");
        let mut stream = response.stream;

        let mut response_text = String::new();
        loop {
            match stream.recv().await {
                Ok(Some(output)) => {
                    response_text.push_str(&BedrockAiBackend::get_converse_output_text(output));
                }
                // means the stream is complete
                Ok(None) => break,
                Err(e) => return Err(classify_sdk_error(e)),
            }
        }
        Ok(response_text)
    }
}
