//! Fixed-length packet codec.
//!
//! Wire layout (20 bytes, multi-byte fields big-endian):
//!
//! | Offset | Field |
//! |---|---|
//! | 0 | device id |
//! | 1 | command id |
//! | 2 | sequence id |
//! | 3..=6 | primary value (distance, angle x10, frequency, or pen state in byte 3) |
//! | 7..=8 | secondary value (duration, sound commands only) |
//! | 9..=18 | zero padding |
//! | 19 | CRC-8 over bytes 0..=18 |

use crate::crc::checksum;
use std::fmt;

/// Header bytes: device, command, sequence.
pub const HEADER_LEN: usize = 3;
/// Payload bytes following the header.
pub const PAYLOAD_LEN: usize = 16;
/// Bytes covered by the checksum.
pub const COMMAND_LEN: usize = HEADER_LEN + PAYLOAD_LEN;
/// Full packet length including the checksum byte.
pub const PACKET_LEN: usize = COMMAND_LEN + 1;

/// Command ids understood by the robot firmware.
pub mod command_id {
    /// Motors: drive a signed distance in millimetres.
    pub const DRIVE_DISTANCE: u8 = 8;
    /// Motors: rotate a signed angle in tenths of a degree.
    pub const ROTATE_ANGLE: u8 = 12;
    /// Marker: set pen position.
    pub const SET_POSITION: u8 = 0;
    /// Sound: play a note.
    pub const PLAY_NOTE: u8 = 0;
}

/// Robot subsystems addressed by the first packet byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Device {
    Motors = 1,
    Marker = 2,
    Sound = 5,
}

impl Device {
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// Identifies an outbound command so its completion notification can be
/// matched back to the waiter.
///
/// Built from the same three header bytes on both sides: from the
/// [`Command`] when sending, from the first three notification bytes when
/// receiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    pub device_id: u8,
    pub command_id: u8,
    pub sequence_id: u8,
}

impl CorrelationKey {
    pub fn new(device_id: u8, command_id: u8, sequence_id: u8) -> Self {
        Self {
            device_id,
            command_id,
            sequence_id,
        }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.device_id, self.command_id, self.sequence_id
        )
    }
}

/// A single robot command. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    device_id: u8,
    command_id: u8,
    sequence_id: u8,
    payload: [u8; PAYLOAD_LEN],
}

impl Command {
    pub fn new(device_id: u8, command_id: u8, sequence_id: u8, payload: [u8; PAYLOAD_LEN]) -> Self {
        Self {
            device_id,
            command_id,
            sequence_id,
            payload,
        }
    }

    /// Command carrying a signed 32-bit value at offsets 3..=6.
    pub fn with_i32(device: Device, command_id: u8, sequence_id: u8, value: i32) -> Self {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload[0..4].copy_from_slice(&value.to_be_bytes());
        Self::new(device.id(), command_id, sequence_id, payload)
    }

    /// Command carrying a single byte at offset 3.
    pub fn with_byte(device: Device, command_id: u8, sequence_id: u8, value: u8) -> Self {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload[0] = value;
        Self::new(device.id(), command_id, sequence_id, payload)
    }

    /// Command carrying a 32-bit value at offsets 3..=6 and a 16-bit value
    /// at offsets 7..=8.
    pub fn with_u32_u16(
        device: Device,
        command_id: u8,
        sequence_id: u8,
        primary: u32,
        secondary: u16,
    ) -> Self {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload[0..4].copy_from_slice(&primary.to_be_bytes());
        payload[4..6].copy_from_slice(&secondary.to_be_bytes());
        Self::new(device.id(), command_id, sequence_id, payload)
    }

    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    pub fn command_id(&self) -> u8 {
        self.command_id
    }

    pub fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    pub fn payload(&self) -> &[u8; PAYLOAD_LEN] {
        &self.payload
    }

    pub fn key(&self) -> CorrelationKey {
        CorrelationKey::new(self.device_id, self.command_id, self.sequence_id)
    }

    /// The 19 checksummed bytes.
    pub fn to_bytes(&self) -> [u8; COMMAND_LEN] {
        let mut bytes = [0u8; COMMAND_LEN];
        bytes[0] = self.device_id;
        bytes[1] = self.command_id;
        bytes[2] = self.sequence_id;
        bytes[HEADER_LEN..].copy_from_slice(&self.payload);
        bytes
    }

    pub fn encode(&self) -> Packet {
        encode(self)
    }
}

/// A sealed 20-byte frame ready for the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet([u8; PACKET_LEN]);

impl Packet {
    pub fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.0
    }

    pub fn checksum(&self) -> u8 {
        self.0[COMMAND_LEN]
    }

    /// True when the trailing byte matches the CRC of the command bytes.
    pub fn is_valid(&self) -> bool {
        checksum(&self.0[..COMMAND_LEN]) == self.checksum()
    }

    pub fn to_hex(&self) -> String {
        self.0
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Lay out `command` and append its checksum.
pub fn encode(command: &Command) -> Packet {
    let body = command.to_bytes();
    let mut frame = [0u8; PACKET_LEN];
    frame[..COMMAND_LEN].copy_from_slice(&body);
    frame[COMMAND_LEN] = checksum(&body);
    Packet(frame)
}

/// Extract the correlation key from an inbound notification.
///
/// Returns `None` for frames too short to carry a header; partial frames are
/// dropped rather than treated as link errors. Bytes past the header are not
/// interpreted.
pub fn decode_notification(bytes: &[u8]) -> Option<CorrelationKey> {
    match bytes {
        [device_id, command_id, sequence_id, ..] => {
            Some(CorrelationKey::new(*device_id, *command_id, *sequence_id))
        }
        _ => None,
    }
}
