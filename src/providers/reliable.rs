use super::Provider;
use super::traits::{ChatRequest, ChatResponse};
use async_trait::async_trait;
use std::time::Duration;

/// Check if an error is non-retryable (client errors that won't resolve with retries).
fn is_non_retryable(err: &anyhow::Error) -> bool {
    if let Some(reqwest_err) = err.downcast_ref::<reqwest::Error>() {
        if let Some(status) = reqwest_err.status() {
            let code = status.as_u16();
            return status.is_client_error() && code != 429 && code != 408;
        }
    }
    if let Some(api_err) = err.downcast_ref::<super::ApiError>() {
        let code = api_err.status;
        return (400..500).contains(&code) && code != 429 && code != 408;
    }
    let msg = err.to_string();
    if msg.contains("API key not set") {
        return true;
    }
    false
}

/// Retries a single provider with exponential backoff.
///
/// A failure is returned only after the last attempt. The caller sees a
/// single call either way.
pub struct ReliableProvider {
    inner: Box<dyn Provider>,
    max_retries: u32,
    base_backoff_ms: u64,
}

impl ReliableProvider {
    pub fn new(inner: Box<dyn Provider>, max_retries: u32, base_backoff_ms: u64) -> Self {
        Self {
            inner,
            max_retries,
            base_backoff_ms: base_backoff_ms.max(50),
        }
    }
}

#[async_trait]
impl Provider for ReliableProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn warmup(&self) -> anyhow::Result<()> {
        tracing::info!(provider = self.inner.name(), "Warming up provider connection pool");
        if let Err(e) = self.inner.warmup().await {
            tracing::warn!(provider = self.inner.name(), "Warmup failed (non-fatal): {e}");
        }
        Ok(())
    }

    async fn chat(
        &self,
        request: ChatRequest<'_>,
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<ChatResponse> {
        let provider_name = self.inner.name();
        let mut backoff_ms = self.base_backoff_ms;
        let mut attempt = 0;

        loop {
            match self.inner.chat(request, model, temperature).await {
                Ok(resp) => {
                    if attempt > 0 {
                        tracing::info!(
                            provider = provider_name,
                            model,
                            attempt,
                            "Provider recovered after retry"
                        );
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    if is_non_retryable(&e) {
                        tracing::warn!(
                            provider = provider_name,
                            model,
                            "Non-retryable error, giving up"
                        );
                        return Err(e);
                    }
                    if attempt >= self.max_retries {
                        return Err(e.context(format!(
                            "{provider_name}/{model} failed after {} attempt(s)",
                            attempt + 1
                        )));
                    }

                    attempt += 1;
                    tracing::warn!(
                        provider = provider_name,
                        model,
                        attempt,
                        backoff_ms,
                        error = %e,
                        "Provider call failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms.saturating_mul(2)).min(10_000);
                }
            }
        }
    }
}
