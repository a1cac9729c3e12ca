use log::{debug, error, warn};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

use crate::chat_memory::ChatMemory;
use crate::error::LlmError;
use crate::llm_provider_trait::{ChatBackend, ChatCompletion, ChatRequest};
use crate::pkg_config::ModelConfig;
use crate::stream::LineBuffer;
use crate::usage::UsageMetrics;
use crate::utils::estimate_prompt_tokens;

/// One configured model endpoint: its backend, its concurrency gate and its
/// call policy (token check, timeout, retries).
pub struct ModelClient {
    config: ModelConfig,
    backend: Arc<dyn ChatBackend>,
    semaphore: Arc<Semaphore>,
    retry_delay: Duration,
}

impl ModelClient {
    pub fn new(config: ModelConfig, backend: Arc<dyn ChatBackend>) -> Self {
        let permits = config.max_concurrency.max(1);
        Self {
            config,
            backend,
            semaphore: Arc::new(Semaphore::new(permits)),
            retry_delay: Duration::from_secs(1),
        }
    }

    /// 重试退避的基础延迟
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Local context window check. Returns the estimated prompt size when the
    /// model has the check enabled.
    fn check_prompt_size(&self, memory: &ChatMemory) -> Result<Option<u64>, LlmError> {
        if !self.config.local_token_check {
            return Ok(None);
        }
        let tokens = estimate_prompt_tokens(memory);
        if tokens > self.config.context_window {
            return Err(LlmError::ContextWindowExceeded {
                tokens,
                context_window: self.config.context_window,
            });
        }
        debug!(
            "Prompt for model {} estimated at {} tokens (window {})",
            self.config.id, tokens, self.config.context_window
        );
        Ok(Some(tokens as u64))
    }

    pub async fn chat(
        &self,
        memory: &ChatMemory,
        sink: Option<&mut (dyn Write + Send)>,
    ) -> Result<(String, UsageMetrics), LlmError> {
        let evaluated_prompt_tokens = self.check_prompt_size(memory)?;

        // 整个调用期间持有许可，drop 时释放
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| LlmError::SemaphoreClosed(self.config.id.clone()))?;

        let request = ChatRequest {
            model: &self.config,
            messages: memory.messages(),
        };

        let started = Instant::now();
        let completion = match sink {
            Some(sink) => self.chat_streaming(request, sink).await?,
            None => self.chat_with_retry(request).await?,
        };

        if completion.content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        let usage = UsageMetrics {
            duration: started.elapsed(),
            evaluated_prompt_tokens,
            provider_usage: completion.usage,
        };
        Ok((completion.content, usage))
    }

    async fn chat_streaming(
        &self,
        request: ChatRequest<'_>,
        sink: &mut (dyn Write + Send),
    ) -> Result<ChatCompletion, LlmError> {
        let limit = self.config.timeout();
        let mut lines = LineBuffer::new(sink);
        let mut on_delta = |delta: &str| {
            if let Err(e) = lines.push(delta) {
                warn!("Failed to echo streamed answer: {}", e);
            }
        };

        let completion = timeout(limit, self.backend.complete(request, Some(&mut on_delta)))
            .await
            .map_err(|_| LlmError::Timeout(limit))??;

        if let Err(e) = lines.finish() {
            warn!("Failed to flush streamed answer: {}", e);
        }
        Ok(completion)
    }

    /// Non-streaming calls are retried with exponential backoff on transport
    /// failures. Streaming calls are not, since part of the answer may already
    /// have been echoed.
    async fn chat_with_retry(&self, request: ChatRequest<'_>) -> Result<ChatCompletion, LlmError> {
        let limit = self.config.timeout();
        let max_attempts = self.config.max_retries + 1;
        let mut attempt = 1;

        loop {
            let result = match timeout(limit, self.backend.complete(request, None)).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(limit)),
            };

            match result {
                Ok(completion) => return Ok(completion),
                Err(e) if attempt < max_attempts && e.is_retryable() => {
                    let delay = self.retry_delay * 2_u32.pow((attempt - 1) as u32);
                    warn!(
                        "Chat with model {} failed: {}. Retrying in {:?} (attempt {} of {})",
                        self.config.id, e, delay, attempt, max_attempts
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        "Chat with model {} failed after {} attempt(s): {}",
                        self.config.id, attempt, e
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_provider_trait::DeltaSink;
    use crate::usage::ProviderUsage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedBackend {
        calls: AtomicUsize,
        fail_first: usize,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(fail_first: usize, delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first,
                delay,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn complete(
            &self,
            _request: ChatRequest<'_>,
            on_delta: Option<DeltaSink<'_>>,
        ) -> Result<ChatCompletion, LlmError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if call < self.fail_first {
                return Err(LlmError::Api {
                    status: 503,
                    body: "busy".to_string(),
                });
            }
            if let Some(sink) = on_delta {
                sink("line one\nline ");
                sink("two");
            }
            Ok(ChatCompletion {
                content: "line one\nline two".to_string(),
                usage: ProviderUsage {
                    prompt_tokens: 3,
                    completion_tokens: 4,
                    total_tokens: 7,
                },
            })
        }

        fn provider_name(&self) -> &'static str {
            "scripted"
        }
    }

    fn memory() -> ChatMemory {
        let mut memory = ChatMemory::new();
        memory.add_system("review this").add_user("fn main() {}");
        memory
    }

    #[tokio::test]
    async fn test_context_window_exceeded_fails_before_dispatch() {
        let backend = Arc::new(ScriptedBackend::new(0, Duration::ZERO));
        let mut config = ModelConfig::new("m", "n", "http://localhost");
        config.local_token_check = true;
        config.context_window = 5;
        let client = ModelClient::new(config, backend.clone());

        let err = client.chat(&memory(), None).await.unwrap_err();
        assert!(matches!(err, LlmError::ContextWindowExceeded { .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retry_then_succeed() {
        let backend = Arc::new(ScriptedBackend::new(2, Duration::ZERO));
        let client = ModelClient::new(ModelConfig::new("m", "n", "http://localhost"), backend.clone())
            .with_retry_delay(Duration::from_millis(1));

        let (answer, usage) = client.chat(&memory(), None).await.unwrap();
        assert_eq!(answer, "line one\nline two");
        assert_eq!(usage.provider_usage.total_tokens, 7);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_streaming_is_line_buffered() {
        let backend = Arc::new(ScriptedBackend::new(0, Duration::ZERO));
        let client = ModelClient::new(ModelConfig::new("m", "n", "http://localhost"), backend);

        let mut out: Vec<u8> = Vec::new();
        let (answer, _) = client.chat(&memory(), Some(&mut out)).await.unwrap();
        assert_eq!(answer, "line one\nline two");
        assert_eq!(String::from_utf8(out).unwrap(), "line one\nline two\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_releases_permit() {
        let backend = Arc::new(ScriptedBackend::new(0, Duration::from_secs(60)));
        let mut config = ModelConfig::new("m", "n", "http://localhost");
        config.timeout_secs = 1;
        config.max_retries = 0;
        let client = ModelClient::new(config, backend);

        let err = client.chat(&memory(), None).await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout(_)));
        assert_eq!(client.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_semaphore_serializes_calls() {
        let backend = Arc::new(ScriptedBackend::new(0, Duration::from_millis(20)));
        let client = Arc::new(ModelClient::new(
            ModelConfig::new("m", "n", "http://localhost"),
            backend.clone(),
        ));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let client = client.clone();
            handles.push(tokio::spawn(async move { client.chat(&memory(), None).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
    }
}
