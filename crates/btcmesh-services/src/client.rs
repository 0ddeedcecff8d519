//! The client-side session engine: drives one transaction send end to end.
//!
//! The engine owns exactly one outstanding chunk at a time and advances
//! or retransmits strictly on the server's explicit request — it never
//! guesses at the server's state.

use std::sync::Arc;
use std::time::Duration;

use btcmesh_core::chunker::{self, CHUNK_SIZE};
use btcmesh_core::wire::WireMessage;
use btcmesh_core::SessionId;
use btcmesh_transport::{Inbound, Transport};
use tokio::sync::{mpsc, watch};

/// How long to wait for a per-chunk ACK before retransmitting.
const ACK_TIMEOUT: Duration = Duration::from_secs(30);
/// How many timeouts a single chunk may survive before the send gives up.
const MAX_RETRIES: u32 = 3;
/// How long to wait for the terminal ACK/NACK once every chunk is sent.
/// Must be at least the server's reassembly timeout so the client never
/// gives up before the server could still finish.
const TERMINAL_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResult {
    Success { txid: String },
    Failure(FailureReason),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("timed out waiting for a reply")]
    Timeout,
    #[error("retry budget exhausted")]
    RetryExhausted,
    #[error("send cancelled")]
    Aborted,
    #[error("peer rejected the session: {detail}")]
    PeerNack { detail: String },
    #[error("transport error: {detail}")]
    Transport { detail: String },
}

#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    pub chunk_size: usize,
    pub ack_timeout: Duration,
    pub max_retries: u32,
    pub terminal_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            ack_timeout: ACK_TIMEOUT,
            max_retries: MAX_RETRIES,
            terminal_timeout: TERMINAL_TIMEOUT,
        }
    }
}

pub struct ClientEngine {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl ClientEngine {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: ClientConfig::default(),
        }
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    /// Send `tx_hex` to `destination`, driving the session to a terminal
    /// result. `inbound` is the receiver half of whatever transport
    /// connection this node joined with; `cancel` lets the caller abort
    /// an in-flight send.
    pub async fn send(
        &self,
        inbound: &mut mpsc::UnboundedReceiver<Inbound>,
        tx_hex: &str,
        destination: &str,
        mut cancel: watch::Receiver<bool>,
    ) -> SendResult {
        let fragments = match chunker::chunk(tx_hex, self.config.chunk_size) {
            Ok(f) => f,
            Err(e) => return SendResult::Failure(FailureReason::Validation(e.to_string())),
        };
        let total = fragments.len() as u32;
        let sid = SessionId::generate();

        let mut current: u32 = 1;
        let mut retries: u32 = 0;
        let mut awaiting_terminal = false;

        if let Err(reason) = self
            .send_chunk(sid, current, total, &fragments, destination)
            .await
        {
            return SendResult::Failure(reason);
        }

        loop {
            if *cancel.borrow() {
                return SendResult::Failure(FailureReason::Aborted);
            }
            let deadline = if awaiting_terminal {
                self.config.terminal_timeout
            } else {
                self.config.ack_timeout
            };

            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        return SendResult::Failure(FailureReason::Aborted);
                    }
                }
                maybe_msg = inbound.recv() => {
                    let Some(msg) = maybe_msg else {
                        return SendResult::Failure(FailureReason::Transport {
                            detail: "inbound channel closed".to_string(),
                        });
                    };
                    if let Some(result) = self
                        .handle_inbound(sid, &mut current, &mut retries, &mut awaiting_terminal, &fragments, total, destination, &msg)
                        .await
                    {
                        return result;
                    }
                }
                _ = tokio::time::sleep(deadline) => {
                    if awaiting_terminal {
                        return SendResult::Failure(FailureReason::Timeout);
                    }
                    if retries >= self.config.max_retries {
                        return SendResult::Failure(FailureReason::RetryExhausted);
                    }
                    retries += 1;
                    if let Err(reason) = self.send_chunk(sid, current, total, &fragments, destination).await {
                        return SendResult::Failure(reason);
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_inbound(
        &self,
        sid: SessionId,
        current: &mut u32,
        retries: &mut u32,
        awaiting_terminal: &mut bool,
        fragments: &[String],
        total: u32,
        destination: &str,
        msg: &Inbound,
    ) -> Option<SendResult> {
        let parsed = match WireMessage::parse(&msg.text) {
            Ok(m) => m,
            Err(_) => return None,
        };

        match parsed {
            WireMessage::ChunkAck { sid: rsid, n, next } if rsid == sid && !*awaiting_terminal => {
                if n != *current {
                    return None;
                }
                if next > total {
                    *awaiting_terminal = true;
                    return None;
                }
                if next == *current || next == *current + 1 {
                    *current = next.max(*current);
                    *retries = 0;
                    if let Err(reason) = self
                        .send_chunk(sid, *current, total, fragments, destination)
                        .await
                    {
                        return Some(SendResult::Failure(reason));
                    }
                }
                // `next` outside the expected window: ignore.
                None
            }
            WireMessage::Ack { sid: rsid, txid } if rsid == sid => {
                Some(SendResult::Success { txid })
            }
            WireMessage::Nack { sid: rsid, detail } if rsid == sid => {
                Some(SendResult::Failure(FailureReason::PeerNack { detail }))
            }
            _ => None,
        }
    }

    async fn send_chunk(
        &self,
        sid: SessionId,
        n: u32,
        total: u32,
        fragments: &[String],
        destination: &str,
    ) -> Result<(), FailureReason> {
        let payload = fragments[(n - 1) as usize].clone();
        let msg = WireMessage::Chunk {
            sid,
            n,
            total,
            payload,
        };
        self.transport
            .send(destination, &msg.to_wire())
            .await
            .map_err(|e| FailureReason::Transport {
                detail: e.to_string(),
            })
    }
}
