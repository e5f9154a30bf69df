use async_trait::async_trait;

use crate::error::BackendError;

/// A text-generation provider: submit a prompt, receive one completion.
///
/// Implementations are shared across requests behind an `Arc`, so they must be
/// `Send + Sync` and hold no per-request state.
#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Short provider name used in log lines.
    fn name(&self) -> &str;

    async fn invoke(&self, prompt: String) -> Result<String, BackendError>;
}
