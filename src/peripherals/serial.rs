//! Serial transport: a UART bridge to the robot.
//!
//! Outbound packets are written as-is. Inbound acknowledgements use the same
//! 20-byte framing, trailing CRC-8 included; each valid frame is delivered as
//! one notification. Bytes that do not start a valid frame are skipped one at
//! a time until the stream lines up again. A read error or EOF ends the link.

use async_trait::async_trait;
use rootclaw_protocol::packet::{COMMAND_LEN, PACKET_LEN};
use rootclaw_protocol::{LinkError, LinkEvent, TransportLink, checksum};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, WriteHalf};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// Allowed serial path patterns (deny arbitrary device files).
const ALLOWED_PATH_PREFIXES: &[&str] = &[
    "/dev/ttyACM",
    "/dev/ttyUSB",
    "/dev/rfcomm",
    "/dev/tty.usbmodem",
    "/dev/cu.usbmodem",
    "/dev/tty.usbserial",
    "/dev/cu.usbserial",
    "COM",
];

fn is_path_allowed(path: &str) -> bool {
    ALLOWED_PATH_PREFIXES.iter().any(|p| path.starts_with(p))
}

pub struct SerialLink {
    name: String,
    writer: Mutex<WriteHalf<SerialStream>>,
    connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl SerialLink {
    /// Open `path` and start forwarding inbound frames. Must be called from
    /// within a Tokio runtime.
    pub fn open(
        path: &str,
        baud: u32,
        queue: usize,
    ) -> anyhow::Result<(Self, mpsc::Receiver<LinkEvent>)> {
        if !is_path_allowed(path) {
            anyhow::bail!(
                "Serial path not allowed: {path}. Allowed: /dev/ttyACM*, /dev/ttyUSB*, /dev/rfcomm*, /dev/tty.usbmodem*, /dev/cu.usbmodem*, COM*"
            );
        }

        let port = tokio_serial::new(path, baud)
            .open_native_async()
            .map_err(|e| anyhow::anyhow!("Failed to open {path}: {e}"))?;
        let (read_half, write_half) = tokio::io::split(port);

        let (tx, rx) = mpsc::channel(queue.max(1));
        let connected = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_frames(read_half, tx, Arc::clone(&connected)));
        tracing::info!(path, baud, "serial link open");

        Ok((
            Self {
                name: format!("serial:{path}"),
                writer: Mutex::new(write_half),
                connected,
                reader,
            },
            rx,
        ))
    }
}

fn is_valid_frame(frame: &[u8]) -> bool {
    checksum(&frame[..COMMAND_LEN]) == frame[COMMAND_LEN]
}

/// Pull every complete, CRC-valid frame off the front of `buf`.
fn take_frames(buf: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let mut skipped = 0usize;
    while buf.len() >= PACKET_LEN {
        if is_valid_frame(&buf[..PACKET_LEN]) {
            frames.push(buf.drain(..PACKET_LEN).collect());
        } else {
            buf.remove(0);
            skipped += 1;
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, "serial stream resynchronised");
    }
    frames
}

async fn read_frames<R>(mut port: R, events: mpsc::Sender<LinkEvent>, connected: Arc<AtomicBool>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(PACKET_LEN * 2);
    let mut chunk = [0u8; 64];
    'read: loop {
        match port.read(&mut chunk).await {
            Ok(0) => {
                tracing::warn!("serial port closed");
                break;
            }
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                for frame in take_frames(&mut buf) {
                    tracing::trace!(frame = ?frame, "serial frame");
                    if events.send(LinkEvent::Notification(frame)).await.is_err() {
                        break 'read;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "serial read ended");
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
    let _ = events.send(LinkEvent::Disconnected).await;
}

#[async_trait]
impl TransportLink for SerialLink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, packet: &[u8]) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::Disconnected);
        }
        let mut port = self.writer.lock().await;
        port.write_all(packet)
            .await
            .map_err(|e| LinkError::Write(e.to_string()))?;
        port.flush()
            .await
            .map_err(|e| LinkError::Write(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.reader.abort();
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
