//! Network communication module
//!
//! Wire types and codecs for the two transports: length-prefixed JSON
//! frames and line-delimited JSON-RPC.

pub mod connection;
pub mod protocol;
pub mod rpc;

pub use connection::NetworkConnection;
pub use protocol::{ClientMessage, ErrorCode, EvaluationPayload, ProtocolHandler, ServerMessage};
pub use rpc::{RpcDispatcher, RpcError, RpcRequest, RpcResponse};
