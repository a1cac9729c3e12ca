use thiserror::Error;

/// Failures of a single chat call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("prompt needs {tokens} tokens, exceeding the context window of {context_window}")]
    ContextWindowExceeded { tokens: usize, context_window: usize },

    #[error("chat request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("model refused to answer: {0}")]
    Refusal(String),

    #[error("semaphore closed for model {0}")]
    SemaphoreClosed(String),

    #[error("invalid provider payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl LlmError {
    /// Transport level failures worth another attempt: timeouts, connection
    /// errors, rate limiting and server side errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout(_) => true,
            LlmError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::Api { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}
