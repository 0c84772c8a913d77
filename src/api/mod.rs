//! Request/response channel.
//!
//! [`ApiClient`] fetches the system config, authenticates the bound
//! [`SubkeyAccount`](crate::account::SubkeyAccount) and stores the resulting
//! session token on the account for the streaming channel to reuse.

mod client;
mod types;

pub use client::ApiClient;
pub use types::{AccountSummary, BridgedToken, SystemConfig, SystemTime};
pub(crate) use types::AuthResponse;
