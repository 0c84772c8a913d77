use std::str::FromStr;

use crate::Result;
use crate::error::Error;

/// Deployment the client talks to.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    Testnet,
    Prod,
}

impl Environment {
    /// Base URL of the REST channel. Always ends with `/` so relative joins keep the version prefix.
    #[must_use]
    pub const fn api_url(self) -> &'static str {
        match self {
            Environment::Testnet => "https://api.testnet.varen.trade/v1/",
            Environment::Prod => "https://api.prod.varen.trade/v1/",
        }
    }

    #[must_use]
    pub const fn ws_url(self) -> &'static str {
        match self {
            Environment::Testnet => "wss://ws.api.testnet.varen.trade/v1",
            Environment::Prod => "wss://ws.api.prod.varen.trade/v1",
        }
    }

    pub fn parse(value: &str) -> Result<Environment> {
        match value.trim().to_ascii_lowercase().as_str() {
            "testnet" | "test" => Ok(Environment::Testnet),
            "prod" | "production" | "mainnet" => Ok(Environment::Prod),
            other => Err(Error::validation(format!(
                "invalid environment: `{other}`; expected one of: testnet|prod"
            ))),
        }
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Environment::parse(s)
    }
}
