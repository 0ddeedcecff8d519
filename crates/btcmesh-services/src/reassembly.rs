//! The server-side reassembly session: one per in-flight transaction send.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use btcmesh_core::SessionId;
use dashmap::DashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Still waiting on one or more chunks.
    Collecting,
    /// All chunks received; the RPC broadcast is in flight.
    Broadcasting,
    /// Broadcast succeeded or failed; a terminal ACK/NACK has been sent.
    Terminal,
}

/// Active sessions, keyed by session id. Each row is guarded by its own
/// `Mutex` so that work on one session never blocks another.
pub type SessionTable = Arc<DashMap<SessionId, Mutex<ReassemblySession>>>;

pub fn new_session_table() -> SessionTable {
    Arc::new(DashMap::new())
}

pub struct ReassemblySession {
    pub sid: SessionId,
    pub total_chunks: u32,
    pub sender: String,
    pub fragments: BTreeMap<u32, String>,
    pub first_seen: Instant,
    pub last_activity: Instant,
    pub status: Status,
}

impl ReassemblySession {
    pub fn new(sid: SessionId, total_chunks: u32, sender: String) -> Self {
        let now = Instant::now();
        Self {
            sid,
            total_chunks,
            sender,
            fragments: BTreeMap::new(),
            first_seen: now,
            last_activity: now,
            status: Status::Collecting,
        }
    }

    /// The lowest chunk number not yet received, in `1..=total_chunks`.
    /// Returns `total_chunks + 1` once every chunk is present — this is
    /// how completion is detected.
    pub fn next_missing(&self) -> u32 {
        for n in 1..=self.total_chunks {
            if !self.fragments.contains_key(&n) {
                return n;
            }
        }
        self.total_chunks + 1
    }

    pub fn is_complete(&self) -> bool {
        self.next_missing() > self.total_chunks
    }

    /// Concatenate all fragments in chunk order. Only meaningful once
    /// `is_complete()` is true.
    pub fn concat_payload(&self) -> String {
        self.fragments.values().cloned().collect()
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}
