//! Conversation turn driver.
//!
//! One user utterance runs the loop: send the transcript plus the tool
//! catalogue, execute any requested tool calls in order, and send again
//! until the assistant answers in plain text or the round cap is hit.

use super::conversation::{DEFAULT_SYSTEM_PROMPT, Transcript};
use crate::config::Config;
use crate::observability::{Observer, ObserverEvent, ObserverMetric};
use crate::pricing;
use crate::providers::{ChatMessage, ChatRequest, Provider, TokenUsage};
use crate::tools::{ToolDispatcher, ToolSpec};
use anyhow::Context;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default cap on assistant calls per user turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Sending,
    ExecutingTools,
    Finished,
}

/// Summary of one completed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Final assistant text, possibly empty.
    pub reply: String,
    /// Assistant calls made.
    pub rounds: usize,
    pub tool_calls: usize,
    /// True when the round cap cut the turn short.
    pub capped: bool,
    /// Summed over all rounds; `None` when the service never reported usage.
    pub usage: Option<TokenUsage>,
    pub cost_usd: Option<f64>,
    pub duration: Duration,
}

pub struct Orchestrator {
    provider: Box<dyn Provider>,
    dispatcher: ToolDispatcher,
    observer: Arc<dyn Observer>,
    tool_specs: Vec<ToolSpec>,
    transcript: Transcript,
    model: String,
    temperature: f64,
    max_rounds: usize,
    state: TurnState,
}

impl Orchestrator {
    pub fn new(
        provider: Box<dyn Provider>,
        dispatcher: ToolDispatcher,
        observer: Arc<dyn Observer>,
    ) -> Self {
        let tool_specs = dispatcher.specs();
        Self {
            provider,
            dispatcher,
            observer,
            tool_specs,
            transcript: Transcript::new(DEFAULT_SYSTEM_PROMPT),
            model: crate::config::DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            state: TurnState::Idle,
        }
    }

    /// Model, temperature, round cap and system prompt from `config`.
    pub fn from_config(
        config: &Config,
        provider: Box<dyn Provider>,
        dispatcher: ToolDispatcher,
        observer: Arc<dyn Observer>,
    ) -> Self {
        let mut orchestrator = Self::new(provider, dispatcher, observer)
            .with_model(&config.default_model)
            .with_temperature(config.default_temperature)
            .with_max_rounds(config.agent.max_tool_rounds);
        if let Some(prompt) = config.system_prompt.as_deref() {
            orchestrator = orchestrator.with_system_prompt(prompt);
        }
        orchestrator
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// A cap of 0 is treated as 1.
    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Replaces the transcript with a fresh one using `prompt`.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.transcript = Transcript::new(prompt);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Start a new conversation.
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.state = TurnState::Idle;
    }

    /// Run one user turn to completion.
    ///
    /// A failed assistant call rolls the transcript back to where it was
    /// before `utterance` and returns the error. Tool failures never end the
    /// turn; they are reported to the assistant as tool results.
    pub async fn handle_utterance(&mut self, utterance: &str) -> anyhow::Result<TurnOutcome> {
        let started = Instant::now();
        let provider_name = self.provider.name().to_string();
        let checkpoint = self.transcript.checkpoint();

        self.transcript.push(ChatMessage::user(utterance));
        self.observer.record_event(&ObserverEvent::AgentStart {
            provider: provider_name.clone(),
            model: self.model.clone(),
        });

        let mut usage: Option<TokenUsage> = None;
        let mut rounds = 0;
        let mut tool_calls = 0;

        let (reply, capped) = loop {
            rounds += 1;
            self.state = TurnState::Sending;
            self.observer.record_event(&ObserverEvent::LlmRequest {
                provider: provider_name.clone(),
                model: self.model.clone(),
                messages_count: self.transcript.len(),
                round: rounds,
            });

            let call_started = Instant::now();
            let request = ChatRequest {
                messages: self.transcript.messages(),
                tools: Some(self.tool_specs.as_slice()),
            };
            let result = self
                .provider
                .chat(request, &self.model, self.temperature)
                .await;
            let call_duration = call_started.elapsed();

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    self.observer.record_event(&ObserverEvent::LlmResponse {
                        provider: provider_name.clone(),
                        model: self.model.clone(),
                        duration: call_duration,
                        success: false,
                        error_message: Some(e.to_string()),
                        input_tokens: None,
                        output_tokens: None,
                    });
                    self.observer.record_event(&ObserverEvent::Error {
                        component: "provider".into(),
                        message: e.to_string(),
                    });
                    let removed = self.transcript.rollback(checkpoint);
                    tracing::warn!(round = rounds, removed, "assistant call failed, turn rolled back");
                    self.state = TurnState::Idle;
                    return Err(e).context("assistant request failed");
                }
            };

            self.observer.record_event(&ObserverEvent::LlmResponse {
                provider: provider_name.clone(),
                model: self.model.clone(),
                duration: call_duration,
                success: true,
                error_message: None,
                input_tokens: response.usage.map(|u| u.input_tokens),
                output_tokens: response.usage.map(|u| u.output_tokens),
            });
            self.observer
                .record_metric(&ObserverMetric::RequestLatency(call_duration));
            if let Some(round_usage) = response.usage {
                self.observer
                    .record_metric(&ObserverMetric::TokensUsed(round_usage.total()));
                usage.get_or_insert_with(TokenUsage::default).add(round_usage);
            }

            if !response.has_tool_calls() {
                let reply = response.text_or_empty().to_string();
                self.transcript.push(ChatMessage::assistant(reply.clone()));
                break (reply, false);
            }

            if rounds >= self.max_rounds {
                tracing::warn!(
                    rounds,
                    pending = response.tool_calls.len(),
                    "tool round cap reached, dropping pending tool calls"
                );
                let reply = response.text_or_empty().to_string();
                self.transcript.push(ChatMessage::assistant(reply.clone()));
                break (reply, true);
            }

            self.state = TurnState::ExecutingTools;
            self.transcript.push(ChatMessage::assistant_with_tools(
                response.text.clone(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                self.observer.record_event(&ObserverEvent::ToolCallStart {
                    tool: call.name.clone(),
                });
                let outcome = self.dispatcher.execute(call).await;
                self.observer.record_event(&ObserverEvent::ToolCall {
                    tool: call.name.clone(),
                    duration: outcome.duration,
                    success: outcome.success,
                });
                tool_calls += 1;
                self.transcript
                    .push(ChatMessage::tool(call.id.clone(), outcome.content));
            }
        };

        self.state = TurnState::Finished;
        let duration = started.elapsed();
        let cost_usd = usage.and_then(|u| {
            pricing::estimate_cost(&self.model, u.input_tokens, u.output_tokens)
        });

        self.observer
            .record_metric(&ObserverMetric::ToolRounds(rounds as u64));
        self.observer
            .record_event(&ObserverEvent::TurnComplete { rounds, capped });
        self.observer.record_event(&ObserverEvent::AgentEnd {
            provider: provider_name,
            model: self.model.clone(),
            duration,
            tokens_used: usage.map(|u| u.total()),
            cost_usd,
        });

        Ok(TurnOutcome {
            reply,
            rounds,
            tool_calls,
            capped,
            usage,
            cost_usd,
            duration,
        })
    }
}
