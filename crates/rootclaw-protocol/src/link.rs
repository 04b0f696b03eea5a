//! Transport boundary between the protocol engine and the radio stack.
//!
//! A [`TransportLink`] only knows how to push bytes out. Inbound traffic
//! arrives separately as a bounded stream of [`LinkEvent`]s that the
//! session drains in arrival order.

use crate::error::LinkError;
use crate::packet::HEADER_LEN;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Inbound traffic from the device side of a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// One inbound notification frame.
    Notification(Vec<u8>),
    /// The device dropped the connection.
    Disconnected,
}

/// Outbound half of a device connection.
#[async_trait]
pub trait TransportLink: Send + Sync {
    /// Backend name for logs (e.g. "simulated", "serial").
    fn name(&self) -> &str;

    /// Write one complete packet.
    async fn write(&self, packet: &[u8]) -> Result<(), LinkError>;

    fn is_connected(&self) -> bool;

    /// Tear the connection down. Idempotent.
    async fn close(&self) {}
}

/// How the simulated device acknowledges commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// Echo the packet header back immediately.
    #[default]
    Echo,
    /// Echo the header after the given delay.
    Delayed(Duration),
    /// Never acknowledge.
    Silent,
}

/// A packet captured by [`SimulatedLink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenPacket {
    pub bytes: Vec<u8>,
    pub at: Instant,
}

struct SimulatedState {
    ack_mode: AckMode,
    refuse_writes: bool,
    written: Vec<WrittenPacket>,
}

struct SimulatedInner {
    events: mpsc::Sender<LinkEvent>,
    connected: AtomicBool,
    state: Mutex<SimulatedState>,
}

/// In-memory robot that acknowledges everything it is sent.
///
/// Cheap to clone; clones share the same device state, so a test can keep
/// one handle for inspection while the session owns another.
#[derive(Clone)]
pub struct SimulatedLink {
    inner: Arc<SimulatedInner>,
}

impl SimulatedLink {
    /// Create a connected link plus the inbound event stream to hand to a
    /// session. `queue` bounds the number of undelivered events.
    pub fn new(queue: usize) -> (Self, mpsc::Receiver<LinkEvent>) {
        let (tx, rx) = mpsc::channel(queue.max(1));
        let link = Self {
            inner: Arc::new(SimulatedInner {
                events: tx,
                connected: AtomicBool::new(true),
                state: Mutex::new(SimulatedState {
                    ack_mode: AckMode::default(),
                    refuse_writes: false,
                    written: Vec::new(),
                }),
            }),
        };
        (link, rx)
    }

    pub fn set_ack_mode(&self, mode: AckMode) {
        self.inner.state.lock().ack_mode = mode;
    }

    /// Make every subsequent write fail with [`LinkError::Write`].
    pub fn set_refuse_writes(&self, refuse: bool) {
        self.inner.state.lock().refuse_writes = refuse;
    }

    /// Everything written so far, oldest first.
    pub fn written(&self) -> Vec<WrittenPacket> {
        self.inner.state.lock().written.clone()
    }

    /// Inject an arbitrary inbound frame.
    pub async fn notify(&self, bytes: Vec<u8>) {
        let _ = self.inner.events.send(LinkEvent::Notification(bytes)).await;
    }

    /// Simulate the device going away.
    pub async fn drop_link(&self) {
        self.inner.connected.store(false, Ordering::SeqCst);
        let _ = self.inner.events.send(LinkEvent::Disconnected).await;
    }
}

#[async_trait]
impl TransportLink for SimulatedLink {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn write(&self, packet: &[u8]) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::Disconnected);
        }

        let ack_mode = {
            let mut state = self.inner.state.lock();
            if state.refuse_writes {
                return Err(LinkError::Write("device refused the write".into()));
            }
            state.written.push(WrittenPacket {
                bytes: packet.to_vec(),
                at: Instant::now(),
            });
            state.ack_mode
        };

        let header = packet[..HEADER_LEN.min(packet.len())].to_vec();
        match ack_mode {
            AckMode::Echo => {
                let _ = self.inner.events.send(LinkEvent::Notification(header)).await;
            }
            AckMode::Delayed(delay) => {
                let events = self.inner.events.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(LinkEvent::Notification(header)).await;
                });
            }
            AckMode::Silent => {}
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.inner.connected.store(false, Ordering::SeqCst);
    }
}
