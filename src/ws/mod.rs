//! Persistent streaming channel (JSON-RPC 2.0 over WebSocket).

mod client;
mod types;

pub use client::{DEFAULT_WS_TIMEOUT, WsClient};
pub use types::SubscriptionMessage;
