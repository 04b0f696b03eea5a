//! Offline packet encoding for firmware debugging.

use crate::PacketKind;
use crate::tools::robot::{
    DEFAULT_ANGLE_DEGREES, DEFAULT_DISTANCE_MM, DEFAULT_FREQUENCY_HZ, DEFAULT_NOTE_DURATION_MS,
};
use rootclaw_protocol::{ActuatorCommandSet, CommandSequencer, Packet, PenPosition};

/// Build the packet a live session would send for `kind` with sequence id
/// `seq`. Missing values use the same defaults as the assistant tools.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn build_packet(kind: PacketKind, value: Option<f64>, duration: Option<f64>, seq: u8) -> Packet {
    let sequencer = CommandSequencer::starting_after(seq.wrapping_sub(1));
    let commands = ActuatorCommandSet::new(&sequencer);
    let (command, _) = match kind {
        PacketKind::Forward => commands.forward(value.unwrap_or(DEFAULT_DISTANCE_MM) as i32),
        PacketKind::Rotate => commands.rotate(value.unwrap_or(DEFAULT_ANGLE_DEGREES)),
        PacketKind::PenUp => commands.pen(PenPosition::Up),
        PacketKind::PenDown => commands.pen(PenPosition::Down),
        PacketKind::Note => commands.play_note(
            value.unwrap_or(DEFAULT_FREQUENCY_HZ) as u32,
            duration.unwrap_or(DEFAULT_NOTE_DURATION_MS) as u16,
        ),
    };
    command.encode()
}
