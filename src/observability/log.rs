use super::traits::{Observer, ObserverEvent, ObserverMetric};
use tracing::{info, warn};

/// Observer that writes every event through `tracing`.
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new()
    }
}

fn millis(duration: &std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::AgentStart { provider, model } => {
                info!(provider = %provider, model = %model, "agent.start");
            }
            ObserverEvent::LlmRequest {
                provider,
                model,
                messages_count,
                round,
            } => {
                info!(
                    provider = %provider,
                    model = %model,
                    messages_count = messages_count,
                    round = round,
                    "llm.request"
                );
            }
            ObserverEvent::LlmResponse {
                provider,
                model,
                duration,
                success,
                error_message,
                input_tokens,
                output_tokens,
            } => {
                info!(
                    provider = %provider,
                    model = %model,
                    duration_ms = millis(duration),
                    success = success,
                    error = ?error_message,
                    input_tokens = ?input_tokens,
                    output_tokens = ?output_tokens,
                    "llm.response"
                );
            }
            ObserverEvent::ToolCallStart { tool } => {
                info!(tool = %tool, "tool.start");
            }
            ObserverEvent::ToolCall {
                tool,
                duration,
                success,
            } => {
                info!(tool = %tool, duration_ms = millis(duration), success = success, "tool.call");
            }
            ObserverEvent::RobotLink { link, connected } => {
                info!(link = %link, connected = connected, "robot.link");
            }
            ObserverEvent::TurnComplete { rounds, capped } => {
                if *capped {
                    warn!(rounds = rounds, "turn.complete (tool round cap reached)");
                } else {
                    info!(rounds = rounds, "turn.complete");
                }
            }
            ObserverEvent::AgentEnd {
                provider,
                model,
                duration,
                tokens_used,
                cost_usd,
            } => {
                info!(
                    provider = %provider,
                    model = %model,
                    duration_ms = millis(duration),
                    tokens = ?tokens_used,
                    cost_usd = ?cost_usd,
                    "agent.end"
                );
            }
            ObserverEvent::Error { component, message } => {
                warn!(component = %component, error = %message, "error");
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::RequestLatency(d) => {
                info!(latency_ms = millis(d), "metric.request_latency");
            }
            ObserverMetric::TokensUsed(t) => {
                info!(tokens = t, "metric.tokens_used");
            }
            ObserverMetric::ToolRounds(r) => {
                info!(rounds = r, "metric.tool_rounds");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}
