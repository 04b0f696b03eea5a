//! Command protocol for the rootclaw drawing robot.
//!
//! The robot speaks fixed-length 20-byte packets over a notify-based link:
//! three header bytes (device, command, sequence), a 16-byte big-endian
//! payload and a trailing CRC-8. Every command is acknowledged by a
//! notification whose first three bytes echo the header, which is how
//! completions are correlated back to the waiting caller.
//!
//! Layering, leaves first:
//! - [`crc`]: CRC-8 (poly 0x07) checksum
//! - [`packet`]: [`Command`], [`Packet`], [`CorrelationKey`] and the codec
//! - [`sequencer`]: wrapping per-session sequence ids
//! - [`pending`]: one completion handle per correlation key, with timeouts
//! - [`link`]: the [`TransportLink`] boundary and an in-memory simulated robot
//! - [`session`]: [`ProtocolSession`], owning all of the above for one connection
//! - [`commands`]: typed builders for each robot capability
//! - [`robot`]: [`Robot`], which sends commands and awaits their completion

pub mod commands;
pub mod crc;
pub mod error;
pub mod link;
pub mod packet;
pub mod pending;
pub mod robot;
pub mod sequencer;
pub mod session;

pub use commands::{ActuatorCommandSet, Note, PenPosition};
pub use crc::checksum;
pub use error::{LinkError, ProtocolError};
pub use link::{AckMode, LinkEvent, SimulatedLink, TransportLink, WrittenPacket};
pub use packet::{Command, CorrelationKey, Device, Packet, decode_notification, encode};
pub use pending::{DuplicatePolicy, PendingCommand, PendingCommandTable};
pub use robot::{MelodyReport, Robot};
pub use sequencer::CommandSequencer;
pub use session::{ProtocolSession, SessionConfig};
