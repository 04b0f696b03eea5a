//! Typed builders for each robot capability.
//!
//! Every builder draws a fresh sequence id and returns the command together
//! with the key its acknowledgement will carry.

use crate::packet::{Command, CorrelationKey, Device, command_id};
use crate::sequencer::CommandSequencer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PenPosition {
    Up = 0,
    Down = 1,
}

/// One melody entry. A zero frequency is a rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub frequency: u32,
    pub duration_ms: u16,
}

impl Note {
    pub const DEFAULT_DURATION_MS: u16 = 500;

    pub fn new(frequency: u32, duration_ms: u16) -> Self {
        Self {
            frequency,
            duration_ms,
        }
    }

    pub fn rest(duration_ms: u16) -> Self {
        Self::new(0, duration_ms)
    }

    pub fn is_rest(&self) -> bool {
        self.frequency == 0
    }
}

/// Command builders bound to one session's sequencer.
pub struct ActuatorCommandSet<'a> {
    sequencer: &'a CommandSequencer,
}

impl<'a> ActuatorCommandSet<'a> {
    pub fn new(sequencer: &'a CommandSequencer) -> Self {
        Self { sequencer }
    }

    /// Drive straight ahead; negative distances reverse.
    pub fn forward(&self, distance_mm: i32) -> (Command, CorrelationKey) {
        self.build(|seq| {
            Command::with_i32(Device::Motors, command_id::DRIVE_DISTANCE, seq, distance_mm)
        })
    }

    /// Rotate in place. Positive is clockwise. Sent as tenths of a degree,
    /// truncated toward zero.
    pub fn rotate(&self, angle_degrees: f64) -> (Command, CorrelationKey) {
        let decidegrees = angle_tenths(angle_degrees);
        self.build(|seq| {
            Command::with_i32(Device::Motors, command_id::ROTATE_ANGLE, seq, decidegrees)
        })
    }

    pub fn pen(&self, position: PenPosition) -> (Command, CorrelationKey) {
        self.build(|seq| {
            Command::with_byte(
                Device::Marker,
                command_id::SET_POSITION,
                seq,
                position as u8,
            )
        })
    }

    pub fn pen_up(&self) -> (Command, CorrelationKey) {
        self.pen(PenPosition::Up)
    }

    pub fn pen_down(&self) -> (Command, CorrelationKey) {
        self.pen(PenPosition::Down)
    }

    pub fn play_note(&self, frequency: u32, duration_ms: u16) -> (Command, CorrelationKey) {
        self.build(|seq| {
            Command::with_u32_u16(
                Device::Sound,
                command_id::PLAY_NOTE,
                seq,
                frequency,
                duration_ms,
            )
        })
    }

    fn build(&self, make: impl FnOnce(u8) -> Command) -> (Command, CorrelationKey) {
        let command = make(self.sequencer.next());
        let key = command.key();
        (command, key)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn angle_tenths(angle_degrees: f64) -> i32 {
    // `as` saturates at the i32 bounds and maps NaN to 0.
    (angle_degrees * 10.0).trunc() as i32
}
