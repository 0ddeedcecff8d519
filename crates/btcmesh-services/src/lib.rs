//! btcmesh-services — the reassembly table and the two session engines
//! that are the core of this system.
//!
//! This crate is pure protocol logic: it depends only on the `Transport`
//! and `RpcAdapter` traits, never on a concrete implementation, so it is
//! fully testable without a real mesh radio or a real Bitcoin Core node.

pub mod client;
pub mod janitor;
pub mod reassembly;
pub mod server;
mod terminal_cache;

pub use reassembly::{ReassemblySession, SessionTable, Status};
pub use server::ServerEngine;
