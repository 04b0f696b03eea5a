use std::time::Duration;

/// Discrete events emitted while a conversation drives the robot.
///
/// Events carry enough context for diagnostics without exposing prompt or
/// reply text.
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    /// A user turn has started.
    AgentStart { provider: String, model: String },
    /// A request is about to be sent to the assistant.
    LlmRequest {
        provider: String,
        model: String,
        messages_count: usize,
        round: usize,
    },
    /// Result of a single assistant call.
    LlmResponse {
        provider: String,
        model: String,
        duration: Duration,
        success: bool,
        error_message: Option<String>,
        input_tokens: Option<u64>,
        output_tokens: Option<u64>,
    },
    /// A tool invocation is about to run.
    ToolCallStart { tool: String },
    /// A tool invocation finished.
    ToolCall {
        tool: String,
        duration: Duration,
        success: bool,
    },
    /// The robot link changed state.
    RobotLink { link: String, connected: bool },
    /// The turn produced its final answer.
    TurnComplete { rounds: usize, capped: bool },
    /// The turn has finished, with aggregate usage when known.
    AgentEnd {
        provider: String,
        model: String,
        duration: Duration,
        tokens_used: Option<u64>,
        cost_usd: Option<f64>,
    },
    /// An error occurred in a named component.
    Error {
        /// "provider", "robot", "config", ...
        component: String,
        /// Must not contain secrets.
        message: String,
    },
}

/// Numeric samples.
#[derive(Debug, Clone)]
pub enum ObserverMetric {
    /// Time elapsed for a single assistant call or tool run.
    RequestLatency(Duration),
    /// Tokens consumed by one assistant call.
    TokensUsed(u64),
    /// Assistant calls made in one turn.
    ToolRounds(u64),
}

/// Sink for runtime telemetry.
///
/// Called synchronously on the hot path; implementations must not block.
pub trait Observer: Send + Sync + 'static {
    fn record_event(&self, event: &ObserverEvent);

    fn record_metric(&self, metric: &ObserverMetric);

    /// Flush buffered data. Called on shutdown.
    fn flush(&self) {}

    /// Backend name, e.g. `"log"`.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CountingObserver {
        events: Mutex<u64>,
        metrics: Mutex<u64>,
    }

    impl Observer for CountingObserver {
        fn record_event(&self, _event: &ObserverEvent) {
            *self.events.lock() += 1;
        }

        fn record_metric(&self, _metric: &ObserverMetric) {
            *self.metrics.lock() += 1;
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn observer_records_events_and_metrics() {
        let observer = CountingObserver::default();

        observer.record_event(&ObserverEvent::RobotLink {
            link: "simulated".into(),
            connected: true,
        });
        observer.record_event(&ObserverEvent::Error {
            component: "robot".into(),
            message: "timeout".into(),
        });
        observer.record_metric(&ObserverMetric::ToolRounds(3));
        observer.flush();

        assert_eq!(*observer.events.lock(), 2);
        assert_eq!(*observer.metrics.lock(), 1);
        assert_eq!(observer.name(), "counting");
    }
}
