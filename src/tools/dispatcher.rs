use super::traits::{Tool, ToolSpec};
use crate::providers::ToolCall;
use std::time::{Duration, Instant};

/// What one tool call produced, ready to append as a `tool` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub content: String,
    pub success: bool,
    pub duration: Duration,
}

/// Routes assistant tool calls to the registered tools.
///
/// Never fails: unknown names, undecodable arguments and device errors all
/// come back as result text for the transcript.
pub struct ToolDispatcher {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolDispatcher {
    pub fn new(tools: Vec<Box<dyn Tool>>) -> Self {
        Self { tools }
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub async fn execute(&self, call: &ToolCall) -> DispatchOutcome {
        let started = Instant::now();
        let (content, success) = self.run(call).await;
        let duration = started.elapsed();
        tracing::info!(
            tool = %call.name,
            call_id = %call.id,
            success,
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "tool call finished"
        );
        DispatchOutcome {
            content,
            success,
            duration,
        }
    }

    async fn run(&self, call: &ToolCall) -> (String, bool) {
        let Some(tool) = self.find(&call.name) else {
            tracing::warn!(tool = %call.name, "assistant requested an unknown tool");
            return (format!("Unknown tool: {}", call.name), false);
        };

        let args = match decode_arguments(&call.arguments) {
            Ok(args) => args,
            Err(e) => {
                return (
                    format!("Error: Invalid arguments for {}: {e}", call.name),
                    false,
                );
            }
        };
        tracing::debug!(tool = %call.name, %args, "executing tool");

        match tool.execute(args).await {
            Ok(result) if result.success => (result.output, true),
            Ok(result) => (
                format!(
                    "Error: {}",
                    result.error.unwrap_or_else(|| "Unknown error".into())
                ),
                false,
            ),
            Err(e) => (format!("Tool execution error: {e}"), false),
        }
    }
}

/// Blank argument strings are treated as an empty object.
fn decode_arguments(raw: &str) -> serde_json::Result<serde_json::Value> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw)
}
