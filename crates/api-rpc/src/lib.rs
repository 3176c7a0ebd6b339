//! JSON-RPC API Layer
//!
//! JSON-RPC 2.0 surface of the ContactSync daemon: sessions, sync
//! submission, status polling, overdue evaluation and progress streaming.

pub mod error;
pub mod handler;
pub mod server;
pub mod session;
pub mod types;

#[cfg(test)]
mod testing;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
pub use session::SessionHub;
