//! In-process loopback transport — pairs named nodes over unbounded
//! channels. Used by `btcmesh-send --dry-run` and by every integration
//! test; never used by the production daemon.
//!
//! Each `LoopbackMesh` is an explicit, caller-owned simulation of the
//! physical mesh: there is no process-wide registry, only whatever mesh
//! object the caller constructed and handed to its nodes.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::transport::{Inbound, Transport, TransportError};

pub struct LoopbackMesh {
    nodes: DashMap<String, mpsc::UnboundedSender<Inbound>>,
}

impl LoopbackMesh {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            nodes: DashMap::new(),
        })
    }

    /// Join the mesh as `node_id`, returning a transport handle and the
    /// receiver for messages addressed to it.
    pub fn node(
        self: &Arc<Self>,
        node_id: impl Into<String>,
    ) -> (LoopbackTransport, mpsc::UnboundedReceiver<Inbound>) {
        let node_id = node_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        self.nodes.insert(node_id.clone(), tx);
        (
            LoopbackTransport {
                mesh: self.clone(),
                local: node_id,
            },
            rx,
        )
    }
}

pub struct LoopbackTransport {
    mesh: Arc<LoopbackMesh>,
    local: String,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, destination: &str, text: &str) -> Result<(), TransportError> {
        let tx = self
            .mesh
            .nodes
            .get(destination)
            .ok_or_else(|| TransportError::SendFailed(format!("unknown node {destination}")))?;

        tx.send(Inbound {
            sender: self.local.clone(),
            text: text.to_string(),
        })
        .map_err(|_| TransportError::SendFailed("destination channel closed".to_string()))
    }

    fn local_node_id(&self) -> &str {
        &self.local
    }
}
