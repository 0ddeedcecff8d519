//! Minimal line-oriented serial transport.
//!
//! Frames each outbound message as one newline-terminated line and reads
//! inbound lines of the form `"<sender>\t<text>"`. This is intentionally
//! the thinnest possible `Transport` implementation over a real device
//! path — the actual mesh radio's own framing (e.g. Meshtastic's packet
//! protocol) is out of scope and is not emulated here.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_serial::SerialPortBuilderExt;
use tokio_util::codec::{Framed, LinesCodec};

use crate::transport::{Inbound, Transport, TransportError};

const DEFAULT_BAUD_RATE: u32 = 115_200;

pub struct SerialTransport {
    local: String,
    writer: Mutex<futures::stream::SplitSink<Framed<tokio_serial::SerialStream, LinesCodec>, String>>,
}

impl SerialTransport {
    /// Open `device_path` and spawn a background task forwarding inbound
    /// lines into the returned receiver, tagged by the sender prefix each
    /// line is expected to carry.
    pub fn open(
        device_path: &Path,
        local_node_id: impl Into<String>,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<Inbound>), TransportError> {
        let port = tokio_serial::new(device_path.to_string_lossy(), DEFAULT_BAUD_RATE)
            .open_native_async()
            .map_err(|e| TransportError::SendFailed(format!("failed to open {device_path:?}: {e}")))?;

        let framed = Framed::new(port, LinesCodec::new());
        let (writer, mut reader) = framed.split();

        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(line) = reader.next().await {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        tracing::warn!(error = %e, "serial line decode failed, skipping");
                        continue;
                    }
                };
                let Some((sender, text)) = line.split_once('\t') else {
                    tracing::trace!(%line, "serial line missing sender prefix, discarding");
                    continue;
                };
                if tx
                    .send(Inbound {
                        sender: sender.to_string(),
                        text: text.to_string(),
                    })
                    .is_err()
                {
                    tracing::info!("serial receiver dropped, stopping read loop");
                    break;
                }
            }
        });

        Ok((
            Arc::new(Self {
                local: local_node_id.into(),
                writer: Mutex::new(writer),
            }),
            rx,
        ))
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&self, destination: &str, text: &str) -> Result<(), TransportError> {
        let line = format!("{destination}\t{text}");
        let mut writer = self.writer.lock().await;
        writer
            .send(line)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn local_node_id(&self) -> &str {
        &self.local
    }
}
