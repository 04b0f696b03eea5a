use crate::providers::traits::{
    ChatMessage, ChatRequest as ProviderChatRequest, ChatResponse as ProviderChatResponse,
    Provider, TokenUsage, ToolCall as ProviderToolCall,
};
use crate::tools::ToolSpec;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI-style `/chat/completions` client with native function calling.
pub struct OpenAiProvider {
    base_url: String,
    credential: Option<String>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct NativeChatRequest<'a> {
    model: &'a str,
    messages: Vec<NativeMessage<'a>>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<NativeToolSpec<'a>>>,
}

#[derive(Debug, Serialize)]
struct NativeMessage<'a> {
    role: &'static str,
    /// Always present for non-assistant roles; `null` for an assistant turn
    /// that only carries tool calls.
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<NativeToolCallOut<'a>>>,
}

#[derive(Debug, Serialize)]
struct NativeToolSpec<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: NativeToolFunctionSpec<'a>,
}

#[derive(Debug, Serialize)]
struct NativeToolFunctionSpec<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct NativeToolCallOut<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    function: NativeFunctionCallOut<'a>,
}

#[derive(Debug, Serialize)]
struct NativeFunctionCallOut<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Debug, Deserialize)]
struct NativeChatResponse {
    choices: Vec<NativeChoice>,
    #[serde(default)]
    usage: Option<NativeUsage>,
}

#[derive(Debug, Deserialize)]
struct NativeChoice {
    message: NativeResponseMessage,
}

#[derive(Debug, Deserialize)]
struct NativeResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<NativeToolCallIn>>,
}

#[derive(Debug, Deserialize)]
struct NativeToolCallIn {
    #[serde(default)]
    id: Option<String>,
    function: NativeFunctionCallIn,
}

#[derive(Debug, Deserialize)]
struct NativeFunctionCallIn {
    name: String,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NativeUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl NativeResponseMessage {
    /// Visible reply text only; an empty string counts as no text.
    fn effective_content(&self) -> Option<String> {
        self.content.clone().filter(|c| !c.is_empty())
    }
}

impl OpenAiProvider {
    pub fn new(credential: Option<&str>) -> Self {
        Self::with_base_url(None, credential)
    }

    /// Create a provider with an optional custom base URL.
    /// Defaults to `https://api.openai.com/v1` when `base_url` is `None`.
    pub fn with_base_url(base_url: Option<&str>, credential: Option<&str>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeouts ({e}), using defaults");
                Client::new()
            });
        Self {
            base_url: base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| crate::config::DEFAULT_API_URL.to_string()),
            credential: credential.map(ToString::to_string),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn convert_tools(tools: Option<&[ToolSpec]>) -> Option<Vec<NativeToolSpec<'_>>> {
        tools.filter(|t| !t.is_empty()).map(|items| {
            items
                .iter()
                .map(|tool| NativeToolSpec {
                    kind: "function",
                    function: NativeToolFunctionSpec {
                        name: &tool.name,
                        description: &tool.description,
                        parameters: &tool.parameters,
                    },
                })
                .collect()
        })
    }

    fn convert_messages(messages: &[ChatMessage]) -> Vec<NativeMessage<'_>> {
        messages
            .iter()
            .map(|m| match m {
                ChatMessage::System { content } | ChatMessage::User { content } => NativeMessage {
                    role: m.role(),
                    content: Some(content.as_str()),
                    tool_call_id: None,
                    tool_calls: None,
                },
                ChatMessage::Assistant {
                    content,
                    tool_calls,
                } => NativeMessage {
                    role: "assistant",
                    content: content.as_deref(),
                    tool_call_id: None,
                    tool_calls: (!tool_calls.is_empty()).then(|| {
                        tool_calls
                            .iter()
                            .map(|tc| NativeToolCallOut {
                                id: &tc.id,
                                kind: "function",
                                function: NativeFunctionCallOut {
                                    name: &tc.name,
                                    arguments: &tc.arguments,
                                },
                            })
                            .collect()
                    }),
                },
                ChatMessage::Tool {
                    tool_call_id,
                    content,
                } => NativeMessage {
                    role: "tool",
                    content: Some(content.as_str()),
                    tool_call_id: Some(tool_call_id.as_str()),
                    tool_calls: None,
                },
            })
            .collect()
    }

    fn parse_native_response(response: NativeChatResponse) -> anyhow::Result<ProviderChatResponse> {
        let usage = response.usage.map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| anyhow::anyhow!("No response from OpenAI"))?;

        let text = message.effective_content();
        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ProviderToolCall {
                id: tc.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                name: tc.function.name,
                arguments: tc.function.arguments.unwrap_or_else(|| "{}".to_string()),
            })
            .collect();

        Ok(ProviderChatResponse {
            text,
            tool_calls,
            usage,
        })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(
        &self,
        request: ProviderChatRequest<'_>,
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<ProviderChatResponse> {
        let credential = self.credential.as_deref().filter(|c| !c.is_empty()).ok_or_else(|| {
            anyhow::anyhow!("OpenAI API key not set. Set OPENAI_API_KEY or edit config.toml.")
        })?;

        let native_request = NativeChatRequest {
            model,
            messages: Self::convert_messages(request.messages),
            temperature,
            tools: Self::convert_tools(request.tools),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {credential}"))
            .json(&native_request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error("OpenAI", response).await);
        }

        let native_response: NativeChatResponse = response.json().await?;
        Self::parse_native_response(native_response)
    }

    async fn warmup(&self) -> anyhow::Result<()> {
        if let Some(credential) = self.credential.as_ref() {
            self.client
                .get(format!("{}/models", self.base_url))
                .header("Authorization", format!("Bearer {credential}"))
                .send()
                .await?
                .error_for_status()?;
        }
        Ok(())
    }
}
