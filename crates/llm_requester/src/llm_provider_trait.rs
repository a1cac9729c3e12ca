use crate::chat_memory::ChatMessage;
use crate::error::LlmError;
use crate::pkg_config::ModelConfig;
use crate::usage::ProviderUsage;

/// One request to a chat completion endpoint.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub model: &'a ModelConfig,
    pub messages: &'a [ChatMessage],
}

/// Full answer of a chat completion, streamed or not.
#[derive(Debug, Clone, Default)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: ProviderUsage,
}

/// Receives answer fragments as they arrive.
pub type DeltaSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// Provider seam for the model gateway.
///
/// When `on_delta` is given the backend streams and hands every fragment to it;
/// the returned completion still carries the whole answer.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(
        &self,
        request: ChatRequest<'_>,
        on_delta: Option<DeltaSink<'_>>,
    ) -> Result<ChatCompletion, LlmError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;
}
