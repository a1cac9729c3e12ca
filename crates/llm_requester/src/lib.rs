//! Model gateway.
//!
//! [`ModelService`] owns one [`ModelClient`] per configured model. Each client
//! gates calls with its own semaphore, checks the prompt against the context
//! window when asked to, bounds every call with the model timeout and retries
//! transport failures of non-streaming calls.

use anyhow::Result;
use log::{debug, info};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

pub mod chat_memory;
pub mod error;
pub mod llm_provider_trait;
pub mod model_client;
pub mod openai_provider;
pub mod pkg_config;
pub mod stream;
pub mod usage;
pub mod utils;

pub use chat_memory::{ChatMemory, ChatMessage, Role};
pub use error::LlmError;
pub use llm_provider_trait::{ChatBackend, ChatCompletion, ChatRequest, DeltaSink};
pub use model_client::ModelClient;
pub use pkg_config::ModelConfig;
pub use usage::{ProviderUsage, UsageMetrics};

pub struct ModelService {
    clients: HashMap<String, ModelClient>,
}

impl ModelService {
    /// Builds an HTTP backend for every model entry.
    pub fn new(models: &[ModelConfig]) -> Result<Self> {
        let mut clients = HashMap::new();
        for model in models {
            let backend: Arc<dyn ChatBackend> = Arc::new(openai_provider::OpenAIProvider::new(model)?);
            clients.insert(model.id.clone(), ModelClient::new(model.clone(), backend));
        }
        info!("Model service ready with {} model(s)", clients.len());
        Ok(Self { clients })
    }

    /// Routes every model through the same backend.
    pub fn with_backend(models: &[ModelConfig], backend: Arc<dyn ChatBackend>) -> Self {
        let clients = models
            .iter()
            .map(|m| (m.id.clone(), ModelClient::new(m.clone(), backend.clone())))
            .collect();
        Self { clients }
    }

    fn client(&self, model_id: &str) -> Result<&ModelClient, LlmError> {
        self.clients
            .get(model_id)
            .ok_or_else(|| LlmError::ModelNotFound(model_id.to_string()))
    }

    pub fn model(&self, model_id: &str) -> Result<&ModelConfig, LlmError> {
        self.client(model_id).map(ModelClient::config)
    }

    pub fn context_window(&self, model_id: &str) -> Result<usize, LlmError> {
        self.model(model_id).map(|m| m.context_window)
    }

    /// Sends the conversation to `model_id`. With a sink the answer is streamed
    /// into it line by line; either way the full answer is returned.
    pub async fn chat(
        &self,
        model_id: &str,
        memory: &ChatMemory,
        sink: Option<&mut (dyn Write + Send)>,
    ) -> Result<(String, UsageMetrics), LlmError> {
        let client = self.client(model_id)?;
        debug!(
            "Chat with model {} ({} messages, streaming: {})",
            model_id,
            memory.messages().len(),
            sink.is_some()
        );
        client.chat(memory, sink).await
    }
}
