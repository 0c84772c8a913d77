//! L2-only client bootstrap.
//!
//! This module wires one subkey identity into both channels:
//! - validate the credential set before any I/O
//! - fetch the system config over REST
//! - build the [`SubkeyAccount`](crate::account::SubkeyAccount) and bind it to REST and streaming

mod client;
mod config;

pub use client::VarenSubkey;
pub use config::{RawSubkeyConfig, SubkeyConfig, SubkeyOptions};
