//! High-level robot handle: build, send, await.

use crate::commands::{ActuatorCommandSet, Note, PenPosition};
use crate::error::ProtocolError;
use crate::session::ProtocolSession;
use std::sync::Arc;
use std::time::Duration;

/// Result of a completed melody.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MelodyReport {
    pub notes_played: usize,
    pub rests: usize,
}

/// Sends actuator commands over a session and waits for each to complete.
#[derive(Clone)]
pub struct Robot {
    session: Arc<ProtocolSession>,
}

impl Robot {
    pub fn new(session: Arc<ProtocolSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<ProtocolSession> {
        &self.session
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    fn commands(&self) -> ActuatorCommandSet<'_> {
        ActuatorCommandSet::new(self.session.sequencer())
    }

    pub async fn forward(&self, distance_mm: i32) -> Result<(), ProtocolError> {
        tracing::info!(distance_mm, "robot forward");
        let (command, _) = self.commands().forward(distance_mm);
        self.session.execute(command).await
    }

    pub async fn rotate(&self, angle_degrees: f64) -> Result<(), ProtocolError> {
        tracing::info!(angle_degrees, "robot rotate");
        let (command, _) = self.commands().rotate(angle_degrees);
        self.session.execute(command).await
    }

    pub async fn set_pen(&self, position: PenPosition) -> Result<(), ProtocolError> {
        tracing::info!(?position, "robot pen");
        let (command, _) = self.commands().pen(position);
        self.session.execute(command).await
    }

    pub async fn play_note(&self, frequency: u32, duration_ms: u16) -> Result<(), ProtocolError> {
        tracing::info!(frequency, duration_ms, "robot note");
        let (command, _) = self.commands().play_note(frequency, duration_ms);
        self.session.execute(command).await
    }

    /// Play `notes` strictly in order. Each sounding note is sent and
    /// acknowledged before the next; rests are local sleeps with no packet.
    /// Stops at the first failed note.
    pub async fn play_melody(&self, notes: &[Note]) -> Result<MelodyReport, ProtocolError> {
        tracing::info!(notes = notes.len(), "robot melody");
        let mut report = MelodyReport::default();
        for note in notes {
            if note.is_rest() {
                tokio::time::sleep(Duration::from_millis(u64::from(note.duration_ms))).await;
                report.rests += 1;
            } else {
                let (command, _) = self.commands().play_note(note.frequency, note.duration_ms);
                self.session.execute(command).await?;
                report.notes_played += 1;
            }
        }
        Ok(report)
    }

    pub async fn disconnect(&self) {
        self.session.disconnect().await;
    }
}
