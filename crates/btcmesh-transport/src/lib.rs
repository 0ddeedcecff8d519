//! btcmesh-transport — the mesh transport adapter interface
//! and the adapters that implement it.
//!
//! The mesh radio driver itself (framing, addressing, RF) is out of scope
//! this crate only owns the narrow contract the two session
//! engines depend on, plus a loopback implementation for tests/dry-run
//! and a minimal line-oriented serial implementation for a real device.

mod loopback;
mod transport;

#[cfg(feature = "serial")]
mod serial;

pub use loopback::{LoopbackMesh, LoopbackTransport};
pub use transport::{Inbound, Transport, TransportError};

#[cfg(feature = "serial")]
pub use serial::SerialTransport;
