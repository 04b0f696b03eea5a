//! Robot transport backends.
//!
//! The simulated link is always available. The serial backend needs the
//! `hardware` feature.

#[cfg(feature = "hardware")]
pub mod serial;

use crate::config::{LinkKind, RobotConfig};
use rootclaw_protocol::{LinkEvent, ProtocolSession, Robot, SimulatedLink, TransportLink};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Open the configured link. Returns the link and its inbound event stream.
pub fn create_link(
    config: &RobotConfig,
) -> anyhow::Result<(Arc<dyn TransportLink>, mpsc::Receiver<LinkEvent>)> {
    match config.link {
        LinkKind::Simulated => {
            let (link, events) = SimulatedLink::new(config.notification_queue);
            Ok((Arc::new(link), events))
        }
        LinkKind::Serial => open_serial(config),
    }
}

#[cfg(feature = "hardware")]
fn open_serial(
    config: &RobotConfig,
) -> anyhow::Result<(Arc<dyn TransportLink>, mpsc::Receiver<LinkEvent>)> {
    let path = config
        .serial_port
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("robot.serial_port must be set for a serial link"))?;
    let (link, events) = serial::SerialLink::open(path, config.baud, config.notification_queue)?;
    Ok((Arc::new(link), events))
}

#[cfg(not(feature = "hardware"))]
fn open_serial(
    _config: &RobotConfig,
) -> anyhow::Result<(Arc<dyn TransportLink>, mpsc::Receiver<LinkEvent>)> {
    anyhow::bail!("serial link support requires building with --features hardware")
}

/// Open the configured link and start a protocol session over it.
pub fn connect_robot(config: &RobotConfig) -> anyhow::Result<Robot> {
    let (link, events) = create_link(config)?;
    tracing::info!(link = link.name(), "robot link connected");
    let session = ProtocolSession::connect(link, events, config.session_config());
    Ok(Robot::new(Arc::new(session)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulated_link_is_the_default() {
        let robot = connect_robot(&RobotConfig::default()).unwrap();
        assert!(robot.is_connected());
        assert_eq!(robot.session().link_name(), "simulated");
        robot.forward(10).await.unwrap();
    }

    #[cfg(not(feature = "hardware"))]
    #[test]
    fn serial_without_feature_is_an_error() {
        let config = RobotConfig {
            link: LinkKind::Serial,
            serial_port: Some("/dev/ttyUSB0".into()),
            ..RobotConfig::default()
        };
        let err = create_link(&config).err().unwrap();
        assert!(err.to_string().contains("--features hardware"));
    }

    #[cfg(feature = "hardware")]
    #[tokio::test]
    async fn serial_requires_port() {
        let config = RobotConfig {
            link: LinkKind::Serial,
            ..RobotConfig::default()
        };
        let err = create_link(&config).err().unwrap();
        assert!(err.to_string().contains("serial_port"));
    }
}
