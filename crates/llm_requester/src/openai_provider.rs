//! OpenAI-compatible chat completion backend over plain HTTP.
//!
//! Covers both the one-shot `/chat/completions` call and its server-sent-event
//! streaming variant. Proxy settings come from the model entry.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::chat_memory::ChatMessage;
use crate::error::LlmError;
use crate::llm_provider_trait::{ChatBackend, ChatCompletion, ChatRequest, DeltaSink};
use crate::pkg_config::ModelConfig;
use crate::usage::ProviderUsage;

/// Fixed sampling seed so repeated runs over the same file stay comparable.
const SEED: u64 = 1;

pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_completion_tokens: u32,
    seed: u64,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ProviderUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: AnswerMessage,
}

#[derive(Deserialize, Default)]
struct AnswerMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ProviderUsage>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: AnswerMessage,
}

impl OpenAIProvider {
    pub fn new(model: &ModelConfig) -> Result<Self> {
        info!(
            "Creating OpenAI-compatible provider for model {} ({})",
            model.id, model.name
        );

        let mut builder = reqwest::Client::builder();
        if let Some(proxy_url) = model.proxy_url.as_ref().filter(|u| !u.is_empty()) {
            let mut proxy = reqwest::Proxy::all(proxy_url)
                .with_context(|| format!("Invalid proxy url for model {}: {}", model.id, proxy_url))?;
            if let Some(user) = model.proxy_user.as_ref().filter(|u| !u.is_empty()) {
                proxy = proxy.basic_auth(user, model.proxy_pass.as_deref().unwrap_or(""));
            }
            debug!("Model {} uses proxy {}", model.id, proxy_url);
            builder = builder.proxy(proxy);
        }
        if model.proxy_insecure_skip_verify {
            warn!("Certificate verification disabled for model {}", model.id);
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .with_context(|| format!("Failed to build http client for model {}", model.id))?;

        let api_key = model.resolve_api_key();
        if api_key.is_none() {
            warn!("No API key configured for model {}", model.id);
        }

        Ok(Self { client, api_key })
    }

    fn endpoint(model: &ModelConfig) -> String {
        format!("{}/chat/completions", model.base_url.trim_end_matches('/'))
    }

    async fn send(&self, request: ChatRequest<'_>, stream: bool) -> Result<reqwest::Response, LlmError> {
        let body = CompletionBody {
            model: &request.model.name,
            messages: request.messages,
            temperature: request.model.temperature,
            max_completion_tokens: request.model.max_completion_tokens,
            seed: SEED,
            stream,
            stream_options: stream.then_some(StreamOptions { include_usage: true }),
        };

        let mut http = self.client.post(Self::endpoint(request.model)).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let response = http.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn complete_once(&self, request: ChatRequest<'_>) -> Result<ChatCompletion, LlmError> {
        let response = self.send(request, false).await?;
        let text = response.text().await?;
        let parsed: CompletionResponse = serde_json::from_str(&text)?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(LlmError::EmptyResponse)?;
        if let Some(refusal) = message.refusal.filter(|r| !r.is_empty()) {
            return Err(LlmError::Refusal(refusal));
        }

        Ok(ChatCompletion {
            content: message.content.unwrap_or_default(),
            usage: parsed.usage.unwrap_or_default(),
        })
    }

    async fn complete_streaming(
        &self,
        request: ChatRequest<'_>,
        on_delta: DeltaSink<'_>,
    ) -> Result<ChatCompletion, LlmError> {
        let mut response = self.send(request, true).await?;

        let mut events = SseEvents::default();
        let mut lines = SseLines::default();
        while !events.done {
            let Some(chunk) = response.chunk().await? else {
                break;
            };
            for data in lines.push(&chunk) {
                events.apply(&data, &mut *on_delta)?;
                if events.done {
                    break;
                }
            }
        }
        // the last event may arrive without a trailing newline
        if !events.done {
            if let Some(data) = lines.finish() {
                events.apply(&data, &mut *on_delta)?;
            }
        }
        events.into_completion()
    }
}

/// Splits a server-sent-event body into the payloads of its `data:` lines.
#[derive(Default)]
struct SseLines {
    pending: Vec<u8>,
}

impl SseLines {
    fn data_of(line: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(line);
        line.trim()
            .strip_prefix("data:")
            .map(|data| data.trim().to_string())
    }

    /// Payloads of every line completed by `chunk`.
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            out.extend(Self::data_of(&line));
        }
        out
    }

    /// Payload of the unterminated line left at end of stream.
    fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.pending);
        Self::data_of(&line)
    }
}

/// Accumulates decoded stream events into one completion.
#[derive(Default)]
struct SseEvents {
    completion: ChatCompletion,
    refusal: String,
    done: bool,
}

impl SseEvents {
    fn apply(&mut self, data: &str, on_delta: &mut (dyn FnMut(&str) + Send)) -> Result<(), LlmError> {
        if data == "[DONE]" {
            self.done = true;
            return Ok(());
        }
        let event: StreamChunk = serde_json::from_str(data)?;
        if let Some(usage) = event.usage {
            self.completion.usage = usage;
        }
        for choice in event.choices {
            if let Some(part) = choice.delta.refusal {
                self.refusal.push_str(&part);
            }
            if let Some(part) = choice.delta.content.filter(|p| !p.is_empty()) {
                on_delta(&part);
                self.completion.content.push_str(&part);
            }
        }
        Ok(())
    }

    fn into_completion(self) -> Result<ChatCompletion, LlmError> {
        if !self.refusal.is_empty() {
            return Err(LlmError::Refusal(self.refusal));
        }
        Ok(self.completion)
    }
}

#[async_trait::async_trait]
impl ChatBackend for OpenAIProvider {
    async fn complete(
        &self,
        request: ChatRequest<'_>,
        on_delta: Option<DeltaSink<'_>>,
    ) -> Result<ChatCompletion, LlmError> {
        match on_delta {
            Some(sink) => self.complete_streaming(request, sink).await,
            None => self.complete_once(request).await,
        }
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_memory::Role;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let model = ModelConfig::new("m", "gpt", "https://api.example.com/v1/");
        assert_eq!(
            OpenAIProvider::endpoint(&model),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let model = ModelConfig::new("m", "gpt", "http://localhost");
        let messages = vec![ChatMessage {
            role: Role::User,
            content: "hi".to_string(),
        }];
        let body = CompletionBody {
            model: &model.name,
            messages: &messages,
            temperature: model.temperature,
            max_completion_tokens: model.max_completion_tokens,
            seed: SEED,
            stream: true,
            stream_options: Some(StreamOptions { include_usage: true }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt");
        assert_eq!(json["seed"], 1);
        assert_eq!(json["stream_options"]["include_usage"], true);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_proxy_settings_accepted() {
        let mut model = ModelConfig::new("m", "gpt", "http://localhost");
        model.proxy_url = Some("http://127.0.0.1:8080".to_string());
        model.proxy_user = Some("u".to_string());
        model.proxy_pass = Some("p".to_string());
        assert!(OpenAIProvider::new(&model).is_ok());
    }

    #[test]
    fn test_unterminated_last_event_is_kept() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"func \"}}]}\n\n",
            ": keep-alive\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"main()\"}}],",
            "\"usage\":{\"prompt_tokens\":7,\"completion_tokens\":2,\"total_tokens\":9}}",
        );
        let mut lines = SseLines::default();
        let mut events = SseEvents::default();
        let mut echoed = String::new();
        let mut sink = |part: &str| echoed.push_str(part);

        // split mid-line to exercise buffering across chunks
        let (head, tail) = body.split_at(30);
        for data in lines.push(head.as_bytes()).into_iter().chain(lines.push(tail.as_bytes())) {
            events.apply(&data, &mut sink).unwrap();
        }
        let last = lines.finish().unwrap();
        events.apply(&last, &mut sink).unwrap();

        let completion = events.into_completion().unwrap();
        assert_eq!(completion.content, "func main()");
        assert_eq!(completion.usage.total_tokens, 9);
        assert_eq!(echoed, "func main()");
    }

    #[test]
    fn test_done_marker_and_refusal() {
        let mut events = SseEvents::default();
        let mut sink = |_: &str| {};
        events
            .apply(r#"{"choices":[{"delta":{"refusal":"cannot help"}}]}"#, &mut sink)
            .unwrap();
        events.apply("[DONE]", &mut sink).unwrap();
        assert!(events.done);
        assert!(matches!(events.into_completion(), Err(LlmError::Refusal(r)) if r == "cannot help"));
    }
}
