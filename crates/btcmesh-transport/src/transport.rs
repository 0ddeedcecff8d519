//! The transport adapter contract.
//!
//! The adapter presents no ordering or delivery guarantees; the protocol
//! built on top of it is designed to tolerate reordering, duplication,
//! and loss within its retry budget.

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport send failed: {0}")]
    SendFailed(String),
}

/// One inbound text message delivered by the transport, tagged with the
/// sender's node id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub sender: String,
    pub text: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `text` to the node identified by `destination`.
    async fn send(&self, destination: &str, text: &str) -> Result<(), TransportError>;

    /// This node's own identifier, for logging only.
    fn local_node_id(&self) -> &str;
}
