//! RPC surface - WebSocket JSON-RPC for node clients
//!
//! Serves the client-facing port (base + 2) with four operations,
//! each identified by `(name, version)`:
//! - `ping/0`: liveness check
//! - `main/0`: trigger the one-time join sequence
//! - `get_peers/0`: current peer list, or null before a join
//! - `get_strongest_blocks/0`: server-streamed tip subscription,
//!   terminated by connection close
//!
//! A malformed frame or an unknown operation closes only the offending
//! connection; node-wide state is untouched.

pub mod protocol;
pub mod server;

pub use protocol::{RpcRequest, StreamError, StreamItem};
pub use server::{RpcContext, RpcServer};
