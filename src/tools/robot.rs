//! Robot actuator tools.
//!
//! Each tool decodes its loosely-typed arguments into a [`RobotAction`],
//! sends it through [`Robot`] and reports a confirmation sentence for the
//! transcript. Device failures (timeouts, a dropped link) come back as a
//! failed [`ToolResult`] so the conversation can carry on.

use super::traits::{Tool, ToolResult};
use async_trait::async_trait;
use rootclaw_protocol::{Note, PenPosition, ProtocolError, Robot};
use serde_json::{Value, json};

pub const DEFAULT_DISTANCE_MM: f64 = 100.0;
pub const DEFAULT_ANGLE_DEGREES: f64 = 90.0;
pub const DEFAULT_FREQUENCY_HZ: f64 = 440.0;
pub const DEFAULT_NOTE_DURATION_MS: f64 = 1000.0;

/// A validated actuator request.
#[derive(Debug, Clone, PartialEq)]
pub enum RobotAction {
    Forward { distance_mm: i32 },
    Rotate { degrees: f64 },
    Pen(PenPosition),
    PlayNote { frequency: u32, duration_ms: u16 },
    PlayMelody { notes: Vec<Note> },
}

/// Numeric argument if present. Absent, `null` and non-numeric values are
/// `None`; an explicit 0 is a value.
fn number_arg(args: &Value, key: &str) -> Option<f64> {
    let value = match args.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    value.is_finite().then_some(value)
}

// Float to integer `as` casts saturate, which is the clamping we want here.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn frequency_arg(args: &Value, default: f64) -> u32 {
    number_arg(args, "frequency").unwrap_or(default) as u32
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn duration_arg(args: &Value, default: f64) -> u16 {
    number_arg(args, "duration").unwrap_or(default) as u16
}

impl RobotAction {
    #[allow(clippy::cast_possible_truncation)]
    pub fn forward(args: &Value) -> Self {
        let distance = number_arg(args, "distance").unwrap_or(DEFAULT_DISTANCE_MM);
        Self::Forward {
            distance_mm: distance as i32,
        }
    }

    pub fn rotate(args: &Value) -> Self {
        Self::Rotate {
            degrees: number_arg(args, "angle").unwrap_or(DEFAULT_ANGLE_DEGREES),
        }
    }

    pub fn play_note(args: &Value) -> Self {
        Self::PlayNote {
            frequency: frequency_arg(args, DEFAULT_FREQUENCY_HZ),
            duration_ms: duration_arg(args, DEFAULT_NOTE_DURATION_MS),
        }
    }

    /// `notes` must be an array. Entries missing a frequency are rests;
    /// entries missing a duration last [`Note::DEFAULT_DURATION_MS`].
    pub fn play_melody(args: &Value) -> Result<Self, String> {
        let entries = args
            .get("notes")
            .and_then(Value::as_array)
            .ok_or_else(|| "notes must be an array of {frequency, duration}".to_string())?;
        let notes = entries
            .iter()
            .map(|entry| {
                Note::new(
                    frequency_arg(entry, 0.0),
                    duration_arg(entry, f64::from(Note::DEFAULT_DURATION_MS)),
                )
            })
            .collect();
        Ok(Self::PlayMelody { notes })
    }

    /// Send the action and wait for the device to acknowledge it.
    pub async fn perform(&self, robot: &Robot) -> Result<String, ProtocolError> {
        match self {
            Self::Forward { distance_mm } => {
                robot.forward(*distance_mm).await?;
                Ok(format!("ロボットを{distance_mm}mm前進させました"))
            }
            Self::Rotate { degrees } => {
                robot.rotate(*degrees).await?;
                Ok(format!("ロボットを{degrees}度回転させました"))
            }
            Self::Pen(position) => {
                robot.set_pen(*position).await?;
                Ok(match position {
                    PenPosition::Up => "ペンを上げました".to_string(),
                    PenPosition::Down => "ペンを下げました".to_string(),
                })
            }
            Self::PlayNote {
                frequency,
                duration_ms,
            } => {
                robot.play_note(*frequency, *duration_ms).await?;
                Ok(format!("{frequency}Hzの音を{duration_ms}ms鳴らしました"))
            }
            Self::PlayMelody { notes } => {
                let report = robot.play_melody(notes).await?;
                tracing::debug!(
                    notes_played = report.notes_played,
                    rests = report.rests,
                    "melody finished"
                );
                Ok(format!("メロディーを演奏しました（{}音符）", notes.len()))
            }
        }
    }
}

async fn run(robot: &Robot, tool: &str, action: RobotAction) -> ToolResult {
    match action.perform(robot).await {
        Ok(confirmation) => ToolResult::success(confirmation),
        Err(e) => {
            if e.is_link_loss() {
                tracing::error!(tool, error = %e, "robot link is down");
            } else {
                tracing::warn!(tool, error = %e, "robot command failed");
            }
            ToolResult::error(e.to_string())
        }
    }
}

/// Drive straight ahead.
pub struct MoveForwardTool {
    robot: Robot,
}

impl MoveForwardTool {
    pub fn new(robot: Robot) -> Self {
        Self { robot }
    }
}

#[async_trait]
impl Tool for MoveForwardTool {
    fn name(&self) -> &str {
        "move_robot_forward"
    }

    fn description(&self) -> &str {
        "ロボットを指定した距離（ミリメートル）だけ前進させます"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "distance": {
                    "type": "number",
                    "description": "前進する距離（ミリメートル）。デフォルトは100mm"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolResult> {
        Ok(run(&self.robot, self.name(), RobotAction::forward(&args)).await)
    }
}

/// Turn in place.
pub struct RotateTool {
    robot: Robot,
}

impl RotateTool {
    pub fn new(robot: Robot) -> Self {
        Self { robot }
    }
}

#[async_trait]
impl Tool for RotateTool {
    fn name(&self) -> &str {
        "rotate_robot"
    }

    fn description(&self) -> &str {
        "ロボットを指定した角度だけ回転させます。正の値で時計回り、負の値で反時計回り"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "angle": {
                    "type": "number",
                    "description": "回転する角度（度）。デフォルトは90度"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolResult> {
        Ok(run(&self.robot, self.name(), RobotAction::rotate(&args)).await)
    }
}

/// Raise or lower the marker. One type backs both `pen_up` and `pen_down`.
pub struct PenTool {
    robot: Robot,
    position: PenPosition,
}

impl PenTool {
    pub fn up(robot: Robot) -> Self {
        Self {
            robot,
            position: PenPosition::Up,
        }
    }

    pub fn down(robot: Robot) -> Self {
        Self {
            robot,
            position: PenPosition::Down,
        }
    }
}

#[async_trait]
impl Tool for PenTool {
    fn name(&self) -> &str {
        match self.position {
            PenPosition::Up => "pen_up",
            PenPosition::Down => "pen_down",
        }
    }

    fn description(&self) -> &str {
        match self.position {
            PenPosition::Up => "ロボットのペンを上げます",
            PenPosition::Down => "ロボットのペンを下げます",
        }
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value) -> anyhow::Result<ToolResult> {
        Ok(run(&self.robot, self.name(), RobotAction::Pen(self.position)).await)
    }
}

/// Sound a single tone.
pub struct PlayNoteTool {
    robot: Robot,
}

impl PlayNoteTool {
    pub fn new(robot: Robot) -> Self {
        Self { robot }
    }
}

#[async_trait]
impl Tool for PlayNoteTool {
    fn name(&self) -> &str {
        "play_note"
    }

    fn description(&self) -> &str {
        "ロボットから指定した周波数の音を指定した時間鳴らします"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "frequency": {
                    "type": "number",
                    "description": "周波数（Hz）。デフォルトは440Hz（ラの音）"
                },
                "duration": {
                    "type": "number",
                    "description": "音を鳴らす時間（ミリ秒）。デフォルトは1000ms"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolResult> {
        Ok(run(&self.robot, self.name(), RobotAction::play_note(&args)).await)
    }
}

/// Play a sequence of notes and rests.
pub struct PlayMelodyTool {
    robot: Robot,
}

impl PlayMelodyTool {
    pub fn new(robot: Robot) -> Self {
        Self { robot }
    }
}

#[async_trait]
impl Tool for PlayMelodyTool {
    fn name(&self) -> &str {
        "play_melody"
    }

    fn description(&self) -> &str {
        "ロボットでメロディー（複数の音符の連続）を演奏します。曲を演奏する場合はこのツールを使用してください"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "notes": {
                    "type": "array",
                    "description": "演奏する音符の配列",
                    "items": {
                        "type": "object",
                        "properties": {
                            "frequency": {
                                "type": "number",
                                "description": "周波数（Hz）。0で休符"
                            },
                            "duration": {
                                "type": "number",
                                "description": "音の長さ（ミリ秒）"
                            }
                        },
                        "required": ["frequency", "duration"]
                    }
                }
            },
            "required": ["notes"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolResult> {
        match RobotAction::play_melody(&args) {
            Ok(action) => Ok(run(&self.robot, self.name(), action).await),
            Err(reason) => Ok(ToolResult::error(format!(
                "Invalid arguments for {}: {reason}",
                self.name()
            ))),
        }
    }
}

/// The fixed catalogue offered to the assistant, in schema order.
pub fn robot_tools(robot: &Robot) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(MoveForwardTool::new(robot.clone())),
        Box::new(RotateTool::new(robot.clone())),
        Box::new(PenTool::up(robot.clone())),
        Box::new(PenTool::down(robot.clone())),
        Box::new(PlayNoteTool::new(robot.clone())),
        Box::new(PlayMelodyTool::new(robot.clone())),
    ]
}
