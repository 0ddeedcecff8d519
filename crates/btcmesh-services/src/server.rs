//! The server-side session engine: turns inbound wire messages into
//! reassembly-table updates, chunk ACKs, and — on completion — an RPC
//! broadcast followed by a terminal ACK or NACK.

use std::sync::Arc;
use std::time::{Duration, Instant};

use btcmesh_core::wire::WireMessage;
use btcmesh_core::SessionId;
use btcmesh_rpc::RpcAdapter;
use btcmesh_transport::Transport;
use tokio::sync::Mutex;

use crate::reassembly::{new_session_table, ReassemblySession, SessionTable, Status};
use crate::terminal_cache::TerminalCache;

pub struct ServerEngine {
    table: SessionTable,
    terminal_cache: Arc<TerminalCache>,
    transport: Arc<dyn Transport>,
    rpc: Arc<dyn RpcAdapter>,
}

impl ServerEngine {
    pub fn new(transport: Arc<dyn Transport>, rpc: Arc<dyn RpcAdapter>) -> Self {
        Self {
            table: new_session_table(),
            terminal_cache: Arc::new(TerminalCache::new()),
            transport,
            rpc,
        }
    }

    /// The active session table, shared with the timeout janitor.
    pub fn session_table(&self) -> SessionTable {
        self.table.clone()
    }

    /// Handle one inbound message from `sender`. Only `BTC_TX` chunks
    /// drive any state change; everything else this node might overhear
    /// (e.g. another relay's ACKs) is logged and dropped.
    pub async fn on_message(&self, sender: &str, text: &str) {
        match WireMessage::parse(text) {
            Ok(WireMessage::Chunk {
                sid,
                n,
                total,
                payload,
            }) => self.on_chunk(sender, sid, n, total, payload).await,
            Ok(other) => {
                tracing::debug!(?other, sender, "server ignoring non-chunk message");
            }
            Err(e) => {
                tracing::debug!(error = %e, sender, "dropping malformed message");
            }
        }
    }

    async fn on_chunk(&self, sender: &str, sid: SessionId, n: u32, total: u32, payload: String) {
        // A duplicate of an already-finished session's last chunk would
        // otherwise look like chunk 1 of a brand new session; replay its
        // terminal message instead.
        if let Some(replay) = self.terminal_cache.get(sid) {
            self.send(sender, &replay).await;
            return;
        }

        let entry = self
            .table
            .entry(sid)
            .or_insert_with(|| Mutex::new(ReassemblySession::new(sid, total, sender.to_string())));
        let mut guard = entry.lock().await;

        if guard.status != Status::Collecting {
            // Already broadcasting or terminal: the spawned broadcast
            // task owns this session's one terminal message, so a late
            // fragment gets no response at all rather than risking a
            // second terminal emission.
            tracing::debug!(%sid, sender, status = ?guard.status, "ignoring chunk for non-collecting session");
            return;
        }

        if guard.sender != sender {
            // A different node claiming an existing session id. Say
            // nothing — acknowledging would leak that the id is in use.
            tracing::debug!(%sid, sender, "ignoring chunk from non-owning sender");
            return;
        }

        if guard.total_chunks != total {
            guard.status = Status::Terminal;
            drop(guard);
            drop(entry);
            self.finish_with(sid, sender, "inconsistent total_chunks".to_string())
                .await;
            return;
        }

        if let Some(existing) = guard.fragments.get(&n) {
            if existing != &payload {
                guard.status = Status::Terminal;
                drop(guard);
                drop(entry);
                self.finish_with(sid, sender, "duplicate chunk number with mismatched payload".to_string())
                    .await;
                return;
            }

            // Exact duplicate: re-ack, no state change.
            guard.touch();
            let next = guard.next_missing();
            drop(guard);
            drop(entry);
            let ack = WireMessage::ChunkAck { sid, n, next };
            self.send(sender, &ack.to_wire()).await;
            return;
        }

        guard.fragments.insert(n, payload);
        guard.touch();
        let next = guard.next_missing();
        let complete = guard.is_complete();
        if complete {
            guard.status = Status::Broadcasting;
        }
        let tx_hex = complete.then(|| guard.concat_payload());
        drop(guard);
        drop(entry);

        let ack = WireMessage::ChunkAck { sid, n, next };
        self.send(sender, &ack.to_wire()).await;

        if let Some(tx_hex) = tx_hex {
            self.spawn_broadcast(sid, sender.to_string(), tx_hex);
        }
    }

    /// Evict `sid`, remember a terminal NACK for replay, and send it.
    /// Used by the error paths in `on_chunk`; the success/failure path
    /// after an RPC broadcast goes through `spawn_broadcast` instead.
    async fn finish_with(&self, sid: SessionId, sender: &str, detail: String) {
        self.table.remove(&sid);
        let msg = WireMessage::Nack { sid, detail };
        let text = msg.to_wire();
        self.terminal_cache.remember(sid, text.clone());
        self.send(sender, &text).await;
    }

    /// Broadcast the reassembled transaction off the critical path so a
    /// slow or stuck RPC call never stalls other sessions.
    fn spawn_broadcast(&self, sid: SessionId, sender: String, tx_hex: String) {
        let rpc = self.rpc.clone();
        let transport = self.transport.clone();
        let table = self.table.clone();
        let terminal_cache = self.terminal_cache.clone();

        tokio::spawn(async move {
            let msg = match rpc.broadcast(&tx_hex).await {
                Ok(txid) => {
                    tracing::info!(%sid, %txid, "transaction broadcast");
                    WireMessage::Ack { sid, txid }
                }
                Err(e) => {
                    tracing::warn!(%sid, error = %e, "rpc broadcast failed");
                    WireMessage::Nack {
                        sid,
                        detail: e.to_string(),
                    }
                }
            };

            table.remove(&sid);
            let text = msg.to_wire();
            terminal_cache.remember(sid, text.clone());
            if let Err(e) = transport.send(&sender, &text).await {
                tracing::warn!(%sid, error = %e, "failed to deliver terminal message");
            }
        });
    }

    async fn send(&self, destination: &str, text: &str) {
        if let Err(e) = self.transport.send(destination, text).await {
            tracing::warn!(destination, error = %e, "failed to deliver message");
        }
    }

    /// Evict reassembly sessions that have been `Collecting` longer than
    /// `reassembly_timeout` without activity, emitting a synthetic NACK
    /// to each pinned sender. Sessions already
    /// `Broadcasting` or `Terminal` are never touched.
    ///
    /// Returns the number of sessions evicted, for logging and tests.
    pub async fn sweep_stale_sessions(&self, reassembly_timeout: Duration) -> usize {
        let now = Instant::now();
        let mut stale = Vec::new();
        for entry in self.table.iter() {
            let Ok(guard) = entry.value().try_lock() else {
                // Mid-handling elsewhere; leave it for the next sweep.
                continue;
            };
            if guard.status == Status::Collecting
                && now.duration_since(guard.last_activity) > reassembly_timeout
            {
                stale.push(*entry.key());
            }
        }

        for sid in &stale {
            let Some((_, mutex)) = self.table.remove(sid) else {
                continue;
            };
            let session = mutex.into_inner();
            let msg = WireMessage::Nack {
                sid: *sid,
                detail: "reassembly timeout".to_string(),
            };
            let text = msg.to_wire();
            self.terminal_cache.remember(*sid, text.clone());
            tracing::info!(sid = %sid, sender = %session.sender, "evicted stale reassembly session");
            self.send(&session.sender, &text).await;
        }

        stale.len()
    }
}
