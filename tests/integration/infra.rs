//! Test harness: wires a client node and a relay node onto one loopback
//! mesh, with the relay's [`ServerEngine`] driven by a background task so
//! scenario tests can drive [`ClientEngine::send`] against a real, if
//! in-process, peer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use btcmesh_rpc::{RpcAdapter, RpcError};
use btcmesh_services::client::{ClientConfig, ClientEngine, SendResult};
use btcmesh_services::server::ServerEngine;
use btcmesh_transport::{Inbound, LoopbackMesh, LoopbackTransport, Transport};
use tokio::sync::{mpsc, watch};

pub const RELAY: &str = "relay";
pub const CLIENT: &str = "client";

/// A fixed-outcome [`RpcAdapter`], for scenarios that don't need the
/// broadcast result to vary mid-test.
pub struct ScriptedRpc {
    result: Result<String, RpcError>,
    pub calls: AtomicUsize,
}

impl ScriptedRpc {
    pub fn ok(txid: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(txid.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(detail: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(RpcError::Rejected(detail.to_string())),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl RpcAdapter for ScriptedRpc {
    async fn broadcast(&self, _tx_hex: &str) -> Result<String, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// A client node, a relay node, and whatever else `extra_nodes` were
/// asked to join — all on one [`LoopbackMesh`].
pub struct Harness {
    pub mesh: Arc<LoopbackMesh>,
    pub client_engine: ClientEngine,
    pub client_rx: mpsc::UnboundedReceiver<Inbound>,
    pub server_engine: Arc<ServerEngine>,
    pub rpc: Arc<ScriptedRpc>,
    relay_task: tokio::task::JoinHandle<()>,
}

impl Harness {
    pub fn new(rpc: Arc<ScriptedRpc>) -> Self {
        Self::with_client_config(rpc, ClientConfig::default())
    }

    pub fn with_client_config(rpc: Arc<ScriptedRpc>, config: ClientConfig) -> Self {
        let mesh = LoopbackMesh::new();
        let (client_transport, client_rx) = mesh.node(CLIENT);
        let (relay_transport, mut relay_rx) = mesh.node(RELAY);

        let server_engine = Arc::new(ServerEngine::new(Arc::new(relay_transport), rpc.clone()));
        let relay_task = {
            let engine = server_engine.clone();
            tokio::spawn(async move {
                while let Some(msg) = relay_rx.recv().await {
                    engine.on_message(&msg.sender, &msg.text).await;
                }
            })
        };

        Self {
            mesh,
            client_engine: ClientEngine::with_config(Arc::new(client_transport), config),
            client_rx,
            server_engine,
            rpc,
            relay_task,
        }
    }

    /// Join the mesh as an extra node, e.g. to send hand-crafted wire
    /// messages that no real `ClientEngine` would ever produce.
    pub fn join(&self, node_id: &str) -> (LoopbackTransport, mpsc::UnboundedReceiver<Inbound>) {
        self.mesh.node(node_id)
    }

    /// Drive one send to completion via the real client engine, with no
    /// cancellation ever requested.
    pub async fn send(&mut self, tx_hex: &str) -> SendResult {
        let (_tx, rx) = watch::channel(false);
        self.client_engine
            .send(&mut self.client_rx, tx_hex, RELAY, rx)
            .await
    }

    pub async fn send_with_cancel(
        &mut self,
        tx_hex: &str,
        cancel: watch::Receiver<bool>,
    ) -> SendResult {
        self.client_engine
            .send(&mut self.client_rx, tx_hex, RELAY, cancel)
            .await
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.relay_task.abort();
    }
}

/// Receive the next message sent to `rx`, failing the test instead of
/// hanging if nothing arrives within a second.
pub async fn recv(rx: &mut mpsc::UnboundedReceiver<Inbound>) -> Inbound {
    tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("channel closed")
}

pub async fn recv_text(rx: &mut mpsc::UnboundedReceiver<Inbound>) -> String {
    recv(rx).await.text
}
