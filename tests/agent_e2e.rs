//! End-to-end tests for a conversation turn driving the simulated robot.
//!
//! A scripted provider stands in for the assistant service and the
//! in-memory device acknowledges (or ignores) every packet, so these run
//! without network or hardware.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rootclaw::agent::{Orchestrator, TurnState};
use rootclaw::observability::{NoopObserver, Observer, ObserverEvent, ObserverMetric};
use rootclaw::providers::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall};
use rootclaw::tools;
use rootclaw_protocol::{AckMode, ProtocolSession, Robot, SessionConfig, SimulatedLink};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Mock infrastructure
// ─────────────────────────────────────────────────────────────────────────────

/// Returns scripted responses in FIFO order and records every request.
struct MockProvider {
    responses: Mutex<VecDeque<Result<ChatResponse>>>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl MockProvider {
    fn new(responses: Vec<Result<ChatResponse>>) -> (Self, Arc<Mutex<Vec<Vec<ChatMessage>>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                responses: Mutex::new(responses.into()),
                requests: Arc::clone(&requests),
            },
            requests,
        )
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(
        &self,
        request: ChatRequest<'_>,
        _model: &str,
        _temperature: f64,
    ) -> Result<ChatResponse> {
        assert_eq!(request.tools.map(<[_]>::len), Some(6));
        self.requests.lock().push(request.messages.to_vec());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(text_response("done")))
    }
}

/// Records event names for ordering assertions.
#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl Observer for RecordingObserver {
    fn record_event(&self, event: &ObserverEvent) {
        let name = match event {
            ObserverEvent::AgentStart { .. } => "agent_start".to_string(),
            ObserverEvent::LlmRequest { round, .. } => format!("llm_request:{round}"),
            ObserverEvent::LlmResponse { success, .. } => format!("llm_response:{success}"),
            ObserverEvent::ToolCallStart { tool } => format!("tool_start:{tool}"),
            ObserverEvent::ToolCall { tool, success, .. } => format!("tool:{tool}:{success}"),
            ObserverEvent::RobotLink { .. } => "robot_link".to_string(),
            ObserverEvent::TurnComplete { capped, .. } => format!("turn_complete:{capped}"),
            ObserverEvent::AgentEnd { .. } => "agent_end".to_string(),
            ObserverEvent::Error { component, .. } => format!("error:{component}"),
        };
        self.events.lock().push(name);
    }

    fn record_metric(&self, _metric: &ObserverMetric) {}

    fn name(&self) -> &str {
        "recording"
    }
}

fn text_response(text: &str) -> ChatResponse {
    ChatResponse {
        text: Some(text.into()),
        ..ChatResponse::default()
    }
}

fn tool_response(calls: &[(&str, serde_json::Value)]) -> ChatResponse {
    ChatResponse {
        text: None,
        tool_calls: calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCall {
                id: format!("call_{i}"),
                name: (*name).to_string(),
                arguments: args.to_string(),
            })
            .collect(),
        usage: None,
    }
}

struct Harness {
    orchestrator: Orchestrator,
    link: SimulatedLink,
    session: Arc<ProtocolSession>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

fn harness(responses: Vec<Result<ChatResponse>>, observer: Arc<dyn Observer>) -> Harness {
    let (link, events) = SimulatedLink::new(64);
    let session = Arc::new(ProtocolSession::connect(
        Arc::new(link.clone()),
        events,
        SessionConfig::default(),
    ));
    let robot = Robot::new(Arc::clone(&session));
    let (provider, requests) = MockProvider::new(responses);
    let orchestrator =
        Orchestrator::new(Box::new(provider), tools::robot_dispatcher(&robot), observer);
    Harness {
        orchestrator,
        link,
        session,
        requests,
    }
}

fn tool_messages(messages: &[ChatMessage]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match m {
            ChatMessage::Tool { content, .. } => Some(content.clone()),
            _ => None,
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn forward_request_sends_one_drive_packet() {
    let mut h = harness(
        vec![
            Ok(tool_response(&[("move_robot_forward", json!({ "distance": 100 }))])),
            Ok(text_response("進みました")),
        ],
        Arc::new(NoopObserver),
    );

    let outcome = h.orchestrator.handle_utterance("前に100mm進んで").await.unwrap();

    assert_eq!(outcome.reply, "進みました");
    assert_eq!(outcome.tool_calls, 1);
    let written = h.link.written();
    assert_eq!(written.len(), 1);
    let bytes = &written[0].bytes;
    assert_eq!(bytes.len(), 20);
    assert_eq!(bytes[0], 1);
    assert_eq!(bytes[1], 8);
    assert_eq!(&bytes[3..7], &100_i32.to_be_bytes());
    assert_eq!(
        tool_messages(h.orchestrator.transcript().messages()),
        ["ロボットを100mm前進させました"]
    );
}

#[tokio::test]
async fn drawing_runs_tool_calls_in_order() {
    let mut h = harness(
        vec![
            Ok(tool_response(&[
                ("pen_down", json!({})),
                ("move_robot_forward", json!({ "distance": 50 })),
                ("rotate_robot", json!({ "angle": 90 })),
                ("pen_up", json!({})),
            ])),
            Ok(text_response("描きました")),
        ],
        Arc::new(NoopObserver),
    );

    h.orchestrator.handle_utterance("線を描いて").await.unwrap();

    let headers: Vec<(u8, u8, u8)> = h
        .link
        .written()
        .iter()
        .map(|p| (p.bytes[0], p.bytes[1], p.bytes[2]))
        .collect();
    assert_eq!(headers, [(2, 0, 0), (1, 8, 1), (1, 12, 2), (2, 0, 3)]);
    assert_eq!(
        tool_messages(h.orchestrator.transcript().messages()),
        [
            "ペンを下げました",
            "ロボットを50mm前進させました",
            "ロボットを90度回転させました",
            "ペンを上げました"
        ]
    );
}

#[tokio::test]
async fn second_request_carries_tool_results() {
    let mut h = harness(
        vec![
            Ok(tool_response(&[("pen_down", json!({}))])),
            Ok(text_response("ok")),
        ],
        Arc::new(NoopObserver),
    );
    h.orchestrator.handle_utterance("ペンを下げて").await.unwrap();

    let requests = h.requests.lock();
    assert_eq!(requests.len(), 2);
    let roles: Vec<&str> = requests[1].iter().map(ChatMessage::role).collect();
    assert_eq!(roles, ["system", "user", "assistant", "tool"]);
}

#[tokio::test(start_paused = true)]
async fn melody_rests_do_not_send_packets() {
    let mut h = harness(
        vec![
            Ok(tool_response(&[(
                "play_melody",
                json!({ "notes": [
                    { "frequency": 440, "duration": 500 },
                    { "frequency": 0, "duration": 300 },
                    { "frequency": 440, "duration": 500 }
                ]}),
            )])),
            Ok(text_response("演奏しました")),
        ],
        Arc::new(NoopObserver),
    );

    h.orchestrator.handle_utterance("何か弾いて").await.unwrap();

    let written = h.link.written();
    assert_eq!(written.len(), 2);
    assert!(written[1].at - written[0].at >= Duration::from_millis(300));
    assert_eq!(
        tool_messages(h.orchestrator.transcript().messages()),
        ["メロディーを演奏しました（3音符）"]
    );
}

#[tokio::test]
async fn endless_tool_calls_stop_at_ten_rounds() {
    let responses = (0..30)
        .map(|_| Ok(tool_response(&[("rotate_robot", json!({ "angle": 10 }))])))
        .collect();
    let mut h = harness(responses, Arc::new(NoopObserver));

    let outcome = h.orchestrator.handle_utterance("回り続けて").await.unwrap();

    assert!(outcome.capped);
    assert_eq!(h.requests.lock().len(), 10);
    assert_eq!(h.link.written().len(), 9);
    assert_eq!(h.orchestrator.state(), TurnState::Finished);
}

#[tokio::test]
async fn failed_assistant_call_restores_transcript() {
    let mut h = harness(
        vec![Err(anyhow::anyhow!("OpenAI API error (500): upstream"))],
        Arc::new(NoopObserver),
    );
    let before = h.orchestrator.transcript().len();

    let err = h.orchestrator.handle_utterance("前に進んで").await.unwrap_err();

    assert!(format!("{err:#}").contains("500"));
    assert_eq!(h.orchestrator.transcript().len(), before);
    assert!(h.link.written().is_empty());
}

#[tokio::test]
async fn unknown_tool_is_reported_back_to_the_assistant() {
    let mut h = harness(
        vec![
            Ok(tool_response(&[("fly_robot", json!({ "height": 10 }))])),
            Ok(text_response("飛べません")),
        ],
        Arc::new(NoopObserver),
    );

    let outcome = h.orchestrator.handle_utterance("飛んで").await.unwrap();

    assert_eq!(outcome.reply, "飛べません");
    assert_eq!(
        tool_messages(h.orchestrator.transcript().messages()),
        ["Unknown tool: fly_robot"]
    );
}

#[tokio::test(start_paused = true)]
async fn device_timeout_becomes_tool_text_and_turn_continues() {
    let mut h = harness(
        vec![
            Ok(tool_response(&[("move_robot_forward", json!({}))])),
            Ok(text_response("ロボットが応答しません")),
        ],
        Arc::new(NoopObserver),
    );
    h.link.set_ack_mode(AckMode::Silent);

    let outcome = h.orchestrator.handle_utterance("進んで").await.unwrap();

    assert_eq!(outcome.reply, "ロボットが応答しません");
    assert_eq!(
        tool_messages(h.orchestrator.transcript().messages()),
        ["Error: command 1-8-0 timed out after 10000ms"]
    );
    assert!(h.session.pending().is_empty());
}

#[tokio::test]
async fn disconnected_robot_is_reported_per_call() {
    let mut h = harness(
        vec![
            Ok(tool_response(&[("pen_up", json!({}))])),
            Ok(text_response("接続されていません")),
        ],
        Arc::new(NoopObserver),
    );
    h.session.disconnect().await;

    h.orchestrator.handle_utterance("ペンを上げて").await.unwrap();

    assert_eq!(
        tool_messages(h.orchestrator.transcript().messages()),
        ["Error: not connected to the robot"]
    );
}

#[tokio::test]
async fn observer_sees_turn_lifecycle_in_order() {
    let observer = Arc::new(RecordingObserver::default());
    let mut h = harness(
        vec![
            Ok(tool_response(&[("pen_down", json!({}))])),
            Ok(text_response("ok")),
        ],
        Arc::clone(&observer) as Arc<dyn Observer>,
    );

    h.orchestrator.handle_utterance("ペン").await.unwrap();

    assert_eq!(
        *observer.events.lock(),
        [
            "agent_start",
            "llm_request:1",
            "llm_response:true",
            "tool_start:pen_down",
            "tool:pen_down:true",
            "llm_request:2",
            "llm_response:true",
            "turn_complete:false",
            "agent_end",
        ]
    );
}

#[tokio::test]
async fn conversation_continues_across_turns() {
    let mut h = harness(
        vec![
            Ok(text_response("こんにちは")),
            Ok(tool_response(&[("play_note", json!({}))])),
            Ok(text_response("鳴らしました")),
        ],
        Arc::new(NoopObserver),
    );

    h.orchestrator.handle_utterance("こんにちは").await.unwrap();
    h.orchestrator.handle_utterance("ラの音を鳴らして").await.unwrap();

    assert_eq!(h.orchestrator.transcript().len(), 7);
    assert_eq!(
        tool_messages(h.orchestrator.transcript().messages()),
        ["440Hzの音を1000ms鳴らしました"]
    );

    h.orchestrator.clear();
    assert_eq!(h.orchestrator.transcript().len(), 1);
}
