use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_temperature() -> f32 {
    0.2
}

fn default_max_completion_tokens() -> u32 {
    4096
}

fn default_context_window() -> usize {
    128_000
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_concurrency() -> usize {
    1
}

fn default_max_retries() -> usize {
    2
}

/// One `[[models]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    pub id: String,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Name of an environment variable holding the key, read when `api_key` is unset.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    #[serde(default)]
    pub local_token_check: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub proxy_user: Option<String>,
    #[serde(default)]
    pub proxy_pass: Option<String>,
    #[serde(default)]
    pub proxy_insecure_skip_verify: bool,
}

impl ModelConfig {
    pub fn new(id: &str, name: &str, base_url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            base_url: base_url.to_string(),
            api_key: None,
            api_key_env: None,
            temperature: default_temperature(),
            max_completion_tokens: default_max_completion_tokens(),
            context_window: default_context_window(),
            local_token_check: false,
            timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            max_retries: default_max_retries(),
            proxy_url: None,
            proxy_user: None,
            proxy_pass: None,
            proxy_insecure_skip_verify: false,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolves the API key, preferring the inline value over the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        self.api_key_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied_on_deserialize() {
        let cfg: ModelConfig = serde_json::from_str(
            r#"{"id":"m","name":"gpt-4o-mini","base_url":"https://api.openai.com/v1"}"#,
        )
        .unwrap();
        assert_eq!(cfg.max_concurrency, 1);
        assert_eq!(cfg.timeout(), Duration::from_secs(120));
        assert!(!cfg.local_token_check);
    }

    #[test]
    fn test_inline_key_wins_over_env() {
        let mut cfg = ModelConfig::new("m", "n", "http://localhost");
        cfg.api_key = Some("inline".to_string());
        cfg.api_key_env = Some("BATCHAI_TEST_UNUSED_KEY".to_string());
        assert_eq!(cfg.resolve_api_key().as_deref(), Some("inline"));
    }
}
