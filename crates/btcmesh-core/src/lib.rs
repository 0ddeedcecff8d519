//! btcmesh-core — wire protocol, chunking, session ids, and shared config.
//! All other btcmesh crates depend on this one.

pub mod chunker;
pub mod config;
pub mod session_id;
pub mod wire;

pub use session_id::SessionId;
