#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::io;
use std::sync::{Arc, Mutex};

use secrecy::SecretString;
use serde_json::{Value, json};
use tracing_subscriber::fmt::MakeWriter;
use varen_client_sdk::SubkeyAccount;
use varen_client_sdk::api::SystemConfig;

// Well-known development keys, never funded.
pub const PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const MAIN_ACCOUNT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

pub fn system_config_json() -> Value {
    json!({
        "gateway_url": "https://gateway.testnet.varen.trade",
        "chain_id": "421614",
        "block_explorer_url": "https://explorer.testnet.varen.trade",
        "settlement_address": "0x1111111111111111111111111111111111111111",
        "settlement_decimals": 8,
        "l1_chain_id": "11155111",
        "bridged_tokens": [],
        "liquidation_fee": "0.2"
    })
}

pub fn system_config() -> SystemConfig {
    serde_json::from_value(system_config_json()).expect("fixture config should deserialize")
}

pub fn account() -> SubkeyAccount {
    SubkeyAccount::new(
        &system_config(),
        SecretString::from(PRIVATE_KEY),
        MAIN_ACCOUNT,
    )
    .expect("fixture account should build")
}

/// In-memory log sink for asserting on emitted events.
#[derive(Clone, Debug, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().expect("capture lock").clone();
        String::from_utf8(bytes).expect("log output is utf-8")
    }

    pub fn dispatch(&self) -> tracing::Dispatch {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::Dispatch::new(subscriber)
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("capture lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = Capture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
