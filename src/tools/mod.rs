pub mod dispatcher;
pub mod robot;
pub mod traits;

pub use dispatcher::{DispatchOutcome, ToolDispatcher};
pub use robot::{
    MoveForwardTool, PenTool, PlayMelodyTool, PlayNoteTool, RobotAction, RotateTool, robot_tools,
};
pub use traits::{Tool, ToolResult, ToolSpec};

use rootclaw_protocol::Robot;

/// Dispatcher over the robot's fixed tool catalogue.
pub fn robot_dispatcher(robot: &Robot) -> ToolDispatcher {
    ToolDispatcher::new(robot_tools(robot))
}
