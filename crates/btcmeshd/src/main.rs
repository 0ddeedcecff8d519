//! btcmeshd — the relay daemon: reassembles chunked transactions arriving
//! over the mesh transport and broadcasts them via Bitcoin Core RPC.

use std::sync::Arc;

use anyhow::Result;
use btcmesh_core::config::BtcMeshConfig;
use btcmesh_rpc::BitcoinCoreRpc;
use btcmesh_services::janitor::Janitor;
use btcmesh_services::server::ServerEngine;
use btcmesh_transport::{LoopbackMesh, Transport};

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity, e.g. RUST_LOG=debug btcmeshd
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = BtcMeshConfig::load()?;
    tracing::info!(
        rpc_host = %config.rpc.host,
        rpc_port = config.rpc.port,
        reassembly_timeout_secs = config.mesh.reassembly_timeout_secs,
        "btcmeshd starting"
    );

    let rpc = Arc::new(BitcoinCoreRpc::new(
        &config.rpc.host,
        config.rpc.port,
        &config.rpc.user,
        &config.rpc.password,
    ));

    let (transport, mut inbound): (Arc<dyn Transport>, _) = build_transport(&config).await?;
    tracing::info!(node_id = transport.local_node_id(), "relay node ready");

    let engine = Arc::new(ServerEngine::new(transport, rpc));

    let reassembly_timeout =
        std::time::Duration::from_secs(config.mesh.reassembly_timeout_secs);
    let janitor = Janitor::new(engine.clone(), reassembly_timeout);
    let janitor_task = janitor.spawn();

    let inbound_task = {
        let engine = engine.clone();
        tokio::spawn(async move {
            while let Some(msg) = inbound.recv().await {
                engine.on_message(&msg.sender, &msg.text).await;
            }
            tracing::warn!("inbound channel closed, no more messages will be processed");
        })
    };

    tokio::select! {
        r = janitor_task => tracing::error!("janitor task exited: {:?}", r),
        r = inbound_task => tracing::error!("inbound task exited: {:?}", r),
    }

    Ok(())
}

#[cfg(feature = "serial")]
async fn build_transport(
    config: &BtcMeshConfig,
) -> Result<(Arc<dyn Transport>, tokio::sync::mpsc::UnboundedReceiver<btcmesh_transport::Inbound>)> {
    use btcmesh_transport::SerialTransport;

    if let Some(device_path) = &config.mesh.device_path {
        let (transport, rx) = SerialTransport::open(device_path, "relay")?;
        return Ok((transport, rx));
    }

    tracing::warn!("no mesh.device_path configured, falling back to an isolated loopback node");
    Ok(loopback_transport())
}

#[cfg(not(feature = "serial"))]
async fn build_transport(
    config: &BtcMeshConfig,
) -> Result<(Arc<dyn Transport>, tokio::sync::mpsc::UnboundedReceiver<btcmesh_transport::Inbound>)> {
    if config.mesh.device_path.is_some() {
        tracing::warn!("mesh.device_path is set but this build lacks the \"serial\" feature");
    }
    Ok(loopback_transport())
}

fn loopback_transport() -> (
    Arc<dyn Transport>,
    tokio::sync::mpsc::UnboundedReceiver<btcmesh_transport::Inbound>,
) {
    let mesh = LoopbackMesh::new();
    let (transport, rx) = mesh.node("relay");
    (Arc::new(transport), rx)
}
