//! btcmesh-rpc — the Bitcoin Core RPC adapter interface
//! and a JSON-RPC implementation of it.

mod adapter;
mod bitcoin_core;

pub use adapter::{RpcAdapter, RpcError};
pub use bitcoin_core::BitcoinCoreRpc;
