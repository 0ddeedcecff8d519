//! The RPC adapter contract — a single, synchronous-from-the-caller's
//! perspective operation: broadcast a transaction hex string.

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// Bitcoin Core rejected the transaction; `detail` is its error
    /// message verbatim (e.g. `txn-mempool-conflict`), surfaced to the
    /// peer unmodified in the terminal NACK.
    #[error("{0}")]
    Rejected(String),

    /// Could not reach or talk to the node at all.
    #[error("rpc connection error: {0}")]
    Connection(String),
}

#[async_trait]
pub trait RpcAdapter: Send + Sync {
    /// Broadcast a raw transaction hex string, returning its txid.
    async fn broadcast(&self, tx_hex: &str) -> Result<String, RpcError>;
}
