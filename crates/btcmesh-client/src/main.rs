//! btcmesh-send — command-line client that fragments one transaction hex
//! string and drives the client session engine to a terminal result.
//!
//! This binary owns only argument parsing, transport selection, and the
//! mapping from a [`SendResult`] to a printed line and an exit code; all
//! protocol behavior lives in `btcmesh_services::client`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use btcmesh_services::client::{ClientEngine, FailureReason, SendResult};
use btcmesh_transport::{LoopbackMesh, Transport};

/// `0` on success.
const EXIT_SUCCESS: u8 = 0;
/// Transaction hex failed local validation; never reached the network.
const EXIT_VALIDATION: u8 = 1;
/// The send timed out or exhausted its retry budget.
const EXIT_TIMEOUT: u8 = 2;
/// The relay rejected the session (bad total_chunks, RPC broadcast failure, ...).
const EXIT_PEER_NACK: u8 = 3;
/// Transport failure or local cancellation.
const EXIT_OTHER: u8 = 4;

struct Args {
    destination: String,
    tx_hex: String,
    device: Option<PathBuf>,
    dry_run: bool,
}

fn print_usage() {
    eprintln!("Usage: btcmesh-send [--device <path>] [--dry-run] <destination> <tx-hex>");
    eprintln!();
    eprintln!("  <destination>   mesh node id of the relay, e.g. !abcdef12");
    eprintln!("  <tx-hex>        raw transaction hex to fragment and send");
    eprintln!("  --device <path> serial device the mesh radio is attached to");
    eprintln!("  --dry-run       validate and chunk locally; never touch the network");
}

fn parse_args(raw: impl Iterator<Item = String>) -> Result<Args> {
    let mut device = None;
    let mut dry_run = false;
    let mut positional = Vec::new();

    let mut iter = raw;
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--device" => {
                let path = iter.next().context("--device requires a value")?;
                device = Some(PathBuf::from(path));
            }
            "--dry-run" => dry_run = true,
            "-h" | "--help" => {
                print_usage();
                std::process::exit(EXIT_SUCCESS as i32);
            }
            other if other.starts_with('-') => bail!("unknown option: {other}"),
            other => positional.push(other.to_string()),
        }
    }

    if positional.len() != 2 {
        print_usage();
        bail!(
            "expected exactly 2 positional arguments, got {}",
            positional.len()
        );
    }

    Ok(Args {
        destination: positional[0].clone(),
        tx_hex: positional[1].clone(),
        device,
        dry_run,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(EXIT_VALIDATION);
        }
    };

    if args.dry_run {
        return ExitCode::from(run_dry(&args.tx_hex));
    }

    match run_send(&args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_OTHER)
        }
    }
}

/// `--dry-run`: validate and chunk locally, never touch a transport.
fn run_dry(tx_hex: &str) -> u8 {
    match btcmesh_core::chunker::chunk(tx_hex, btcmesh_core::chunker::CHUNK_SIZE) {
        Ok(fragments) => {
            println!(
                "OK: {} hex characters would split into {} chunk(s) of up to {} characters",
                tx_hex.len(),
                fragments.len(),
                btcmesh_core::chunker::CHUNK_SIZE
            );
            EXIT_SUCCESS
        }
        Err(e) => {
            println!("FAILURE: validation error: {e}");
            EXIT_VALIDATION
        }
    }
}

async fn run_send(args: &Args) -> Result<u8> {
    let (transport, mut inbound) = build_transport(args.device.as_deref())?;
    tracing::info!(
        node_id = transport.local_node_id(),
        destination = %args.destination,
        "sending transaction"
    );

    let engine = ClientEngine::new(transport);
    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);

    let result = tokio::select! {
        result = engine.send(&mut inbound, &args.tx_hex, &args.destination, cancel_rx) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, aborting send");
            let _ = cancel_tx.send(true);
            SendResult::Failure(FailureReason::Aborted)
        }
    };

    Ok(report(result))
}

fn report(result: SendResult) -> u8 {
    match result {
        SendResult::Success { txid } => {
            println!("SUCCESS: {txid}");
            EXIT_SUCCESS
        }
        SendResult::Failure(reason) => {
            println!("FAILURE: {reason}");
            match reason {
                FailureReason::Validation(_) => EXIT_VALIDATION,
                FailureReason::Timeout | FailureReason::RetryExhausted => EXIT_TIMEOUT,
                FailureReason::PeerNack { .. } => EXIT_PEER_NACK,
                FailureReason::Aborted | FailureReason::Transport { .. } => EXIT_OTHER,
            }
        }
    }
}

/// A real send needs a serial device (the `serial` feature); `--dry-run`
/// is the only supported path when one isn't available.
#[cfg(feature = "serial")]
fn build_transport(
    device: Option<&std::path::Path>,
) -> Result<(
    Arc<dyn Transport>,
    tokio::sync::mpsc::UnboundedReceiver<btcmesh_transport::Inbound>,
)> {
    use btcmesh_transport::SerialTransport;

    let Some(device) = device else {
        bail!("--device <path> is required (pass --dry-run to validate without a transport)");
    };
    let (transport, rx) = SerialTransport::open(device, "btcmesh-send")?;
    Ok((transport, rx))
}

#[cfg(not(feature = "serial"))]
fn build_transport(
    device: Option<&std::path::Path>,
) -> Result<(
    Arc<dyn Transport>,
    tokio::sync::mpsc::UnboundedReceiver<btcmesh_transport::Inbound>,
)> {
    if device.is_some() {
        bail!("--device was given but this build lacks the \"serial\" feature");
    }
    tracing::warn!(
        "no serial transport in this build, using an isolated loopback node (nothing will reply)"
    );
    let mesh = LoopbackMesh::new();
    let (transport, rx) = mesh.node("btcmesh-send");
    Ok((Arc::new(transport), rx))
}
