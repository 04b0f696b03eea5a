pub mod schema;

pub use schema::{
    AgentConfig, Config, DEFAULT_API_URL, DEFAULT_MODEL, LinkKind, ObservabilityConfig,
    ReliabilityConfig, RobotConfig,
};
