//! End-to-end scenarios run over `LoopbackTransport`
//! with a scripted `RpcAdapter`. No real mesh radio or Bitcoin Core node
//! is involved — that is the point of the transport/RPC adapter
//! boundary.

mod infra;

mod properties;
mod scenarios;
