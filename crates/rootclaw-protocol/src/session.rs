//! One connection to one robot.
//!
//! [`ProtocolSession`] owns the sequence counter, the pending-command table
//! and the outbound link for the lifetime of a connection. Inbound
//! notifications are drained by a background pump task in FIFO order.

use crate::error::{LinkError, ProtocolError};
use crate::link::{LinkEvent, TransportLink};
use crate::packet::{Command, decode_notification};
use crate::pending::{DuplicatePolicy, PendingCommandTable};
use crate::sequencer::CommandSequencer;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default per-command completion deadline.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Deadline for each command, measured from send time.
    pub command_timeout: Duration,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

pub struct ProtocolSession {
    link: Arc<dyn TransportLink>,
    sequencer: CommandSequencer,
    pending: Arc<PendingCommandTable>,
    config: SessionConfig,
    open: Arc<AtomicBool>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ProtocolSession {
    /// Bind a session to `link` and start draining `events`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(
        link: Arc<dyn TransportLink>,
        events: mpsc::Receiver<LinkEvent>,
        config: SessionConfig,
    ) -> Self {
        let pending = Arc::new(PendingCommandTable::new(config.duplicate_policy));
        let open = Arc::new(AtomicBool::new(true));

        let pump = tokio::spawn(pump_notifications(
            events,
            Arc::clone(&pending),
            Arc::clone(&open),
        ));

        tracing::info!(link = link.name(), "protocol session connected");

        Self {
            link,
            sequencer: CommandSequencer::new(),
            pending,
            config,
            open,
            pump: Mutex::new(Some(pump)),
        }
    }

    pub fn sequencer(&self) -> &CommandSequencer {
        &self.sequencer
    }

    pub fn pending(&self) -> &PendingCommandTable {
        &self.pending
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn link_name(&self) -> &str {
        self.link.name()
    }

    pub fn is_connected(&self) -> bool {
        self.open.load(Ordering::SeqCst) && self.link.is_connected()
    }

    /// Send `command` and wait for the device to acknowledge it.
    ///
    /// Never retries. The waiter is registered before the write so an
    /// immediate acknowledgement cannot be missed.
    pub async fn execute(&self, command: Command) -> Result<(), ProtocolError> {
        if !self.is_connected() {
            return Err(ProtocolError::NotConnected);
        }

        let key = command.key();
        let packet = command.encode();
        let pending = self.pending.register(key)?;

        // Teardown may have drained the table between the check above and
        // the registration.
        if !self.open.load(Ordering::SeqCst) {
            self.pending.cancel(&pending);
            return Err(ProtocolError::LinkClosed);
        }

        tracing::debug!(
            device = key.device_id,
            command = key.command_id,
            seq = key.sequence_id,
            packet = %packet.to_hex(),
            "sending command"
        );

        if let Err(e) = self.link.write(packet.as_ref()).await {
            self.pending.cancel(&pending);
            tracing::warn!(%key, error = %e, "command write failed");
            return Err(match e {
                LinkError::Disconnected => ProtocolError::NotConnected,
                other => ProtocolError::Link(other),
            });
        }

        let result = self.pending.wait(pending, self.config.command_timeout).await;
        match &result {
            Ok(()) => tracing::debug!(%key, "command completed"),
            Err(e) => tracing::warn!(%key, error = %e, "command failed"),
        }
        result
    }

    /// User-initiated teardown. Fails every pending command with
    /// [`ProtocolError::LinkClosed`].
    pub async fn disconnect(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        self.link.close().await;
        let failed = self.pending.fail_all(&ProtocolError::LinkClosed);
        tracing::info!(link = self.link.name(), failed, "protocol session disconnected");
    }
}

impl Drop for ProtocolSession {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().take() {
            pump.abort();
        }
    }
}

async fn pump_notifications(
    mut events: mpsc::Receiver<LinkEvent>,
    pending: Arc<PendingCommandTable>,
    open: Arc<AtomicBool>,
) {
    while let Some(event) = events.recv().await {
        match event {
            LinkEvent::Notification(bytes) => match decode_notification(&bytes) {
                Some(key) => {
                    if !pending.resolve(&key) {
                        tracing::debug!(%key, "unmatched notification");
                    }
                }
                None => {
                    tracing::debug!(len = bytes.len(), "dropping malformed notification");
                }
            },
            LinkEvent::Disconnected => {
                tracing::warn!("device disconnected");
                break;
            }
        }
    }

    open.store(false, Ordering::SeqCst);
    let failed = pending.fail_all(&ProtocolError::LinkClosed);
    if failed > 0 {
        tracing::warn!(failed, "failed pending commands after link loss");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{AckMode, SimulatedLink};
    use crate::packet::{Device, command_id};

    fn forward(seq: u8) -> Command {
        Command::with_i32(Device::Motors, command_id::DRIVE_DISTANCE, seq, 100)
    }

    #[tokio::test]
    async fn execute_completes_on_echo() {
        let (link, events) = SimulatedLink::new(16);
        let session = ProtocolSession::connect(
            Arc::new(link.clone()),
            events,
            SessionConfig::default(),
        );

        session.execute(forward(1)).await.unwrap();
        assert_eq!(link.written().len(), 1);
        assert!(session.pending().is_empty());
    }

    #[tokio::test]
    async fn malformed_notification_is_ignored() {
        let (link, events) = SimulatedLink::new(16);
        let session = ProtocolSession::connect(
            Arc::new(link.clone()),
            events,
            SessionConfig::default(),
        );

        link.notify(vec![1]).await;
        link.notify(Vec::new()).await;
        session.execute(forward(2)).await.unwrap();
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn write_failure_is_reported_and_unregistered() {
        let (link, events) = SimulatedLink::new(16);
        link.set_refuse_writes(true);
        let session = ProtocolSession::connect(
            Arc::new(link.clone()),
            events,
            SessionConfig::default(),
        );

        let err = session.execute(forward(3)).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Link(LinkError::Write(_))));
        assert!(session.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_fails_pending_with_link_closed() {
        let (link, events) = SimulatedLink::new(16);
        link.set_ack_mode(AckMode::Silent);
        let session = Arc::new(ProtocolSession::connect(
            Arc::new(link.clone()),
            events,
            SessionConfig::default(),
        ));

        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.execute(forward(4)).await })
        };
        while session.pending().is_empty() {
            tokio::task::yield_now().await;
        }

        session.disconnect().await;
        assert_eq!(waiter.await.unwrap(), Err(ProtocolError::LinkClosed));
        assert_eq!(
            session.execute(forward(5)).await,
            Err(ProtocolError::NotConnected)
        );
    }
}
