//! Sales server module
//!
//! Listeners, per-connection sessions and shutdown for both transports.

pub mod connection_manager;
pub mod rpc_session;
pub mod sales_server;

pub use connection_manager::{Connection, ConnectionManager};
pub use rpc_session::RpcSessionManager;
pub use sales_server::SalesServer;
