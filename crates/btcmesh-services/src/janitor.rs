//! Periodic sweep that evicts stale reassembly sessions.
//!
//! Kept as a thin driver around [`ServerEngine::sweep_stale_sessions`] so
//! the eviction logic itself stays directly unit-testable without a
//! running timer.

use std::sync::Arc;
use std::time::Duration;

use crate::server::ServerEngine;

/// Default reassembly timeout: sessions stuck `Collecting` longer than
/// this are evicted with a synthetic NACK.
pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_secs(300);
/// Default sweep period. Spec requires at most 1s between sweeps.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

pub struct Janitor {
    engine: Arc<ServerEngine>,
    reassembly_timeout: Duration,
    tick_interval: Duration,
}

impl Janitor {
    pub fn new(engine: Arc<ServerEngine>, reassembly_timeout: Duration) -> Self {
        Self {
            engine,
            reassembly_timeout,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Spawn the sweep loop. Runs until the returned handle is dropped or
    /// aborted; the server has no other way to stop the janitor.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.tick_interval);
            loop {
                ticker.tick().await;
                let evicted = self.engine.sweep_stale_sessions(self.reassembly_timeout).await;
                if evicted > 0 {
                    tracing::debug!(evicted, "janitor swept stale sessions");
                }
            }
        })
    }
}
