pub mod openai;
pub mod reliable;
pub mod traits;

pub use openai::OpenAiProvider;
pub use reliable::ReliableProvider;
pub use traits::{ChatMessage, ChatRequest, ChatResponse, Provider, TokenUsage, ToolCall};

use crate::config::Config;

const MAX_ERROR_BODY_CHARS: usize = 400;

/// Non-2xx response from a chat-completion service.
#[derive(Debug, thiserror::Error)]
#[error("{provider} API error ({status}): {body}")]
pub struct ApiError {
    pub provider: String,
    pub status: u16,
    pub body: String,
}

/// Build an [`ApiError`] from a failed HTTP response, truncating the body.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read response body>".to_string());
    let body = truncate_chars(body.trim(), MAX_ERROR_BODY_CHARS);
    ApiError {
        provider: provider.to_string(),
        status,
        body,
    }
    .into()
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Factory: the configured assistant endpoint, wrapped for retries when
/// `reliability.provider_retries` is non-zero.
pub fn create_provider(config: &Config) -> Box<dyn Provider> {
    let base: Box<dyn Provider> = Box::new(OpenAiProvider::with_base_url(
        Some(&config.api_url),
        config.api_key.as_deref(),
    ));
    if config.reliability.provider_retries == 0 {
        base
    } else {
        Box::new(ReliableProvider::new(
            base,
            config.reliability.provider_retries,
            config.reliability.provider_backoff_ms,
        ))
    }
}
