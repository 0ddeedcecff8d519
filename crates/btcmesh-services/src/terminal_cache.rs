//! The "recently completed" replay ring.
//!
//! Once a session reaches `Terminal`, it is dropped from the active
//! session table immediately — but a duplicate final chunk can still
//! arrive afterwards (the client resends whenever its own ACK is lost,
//! even though the server already finished). Without this ring that
//! duplicate would look like chunk 1 of a brand new session. Instead we
//! remember the exact terminal message text for a bounded number of the
//! most recently finished sessions and replay it byte-for-byte.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use btcmesh_core::SessionId;
use lru::LruCache;

/// Number of terminal sessions whose last message is kept for replay.
/// Sized well above the expected number of sessions that could be
/// in-flight at once on a single mesh node.
const CAPACITY: usize = 64;

pub struct TerminalCache {
    inner: Mutex<LruCache<SessionId, String>>,
}

impl TerminalCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LruCache::new(NonZeroUsize::new(CAPACITY).unwrap())),
        }
    }

    pub fn remember(&self, sid: SessionId, terminal_text: String) {
        self.inner
            .lock()
            .expect("terminal cache mutex poisoned")
            .put(sid, terminal_text);
    }

    /// Returns the remembered terminal message, if `sid` finished recently.
    pub fn get(&self, sid: SessionId) -> Option<String> {
        self.inner
            .lock()
            .expect("terminal cache mutex poisoned")
            .get(&sid)
            .cloned()
    }
}

impl Default for TerminalCache {
    fn default() -> Self {
        Self::new()
    }
}
