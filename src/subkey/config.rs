use std::time::Duration;

use bon::Builder;
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use tracing::Dispatch;

use crate::Result;
use crate::environment::Environment;
use crate::error::Error;

/// Raw subkey values typically read from app-level config or the environment.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawSubkeyConfig {
    pub env: Option<String>,
    pub l2_private_key: Option<SecretString>,
    pub l2_address: Option<String>,
    pub ws_timeout_secs: Option<u64>,
}

/// Validated credential set for L2-only authentication.
///
/// Holding one means the environment is known and both the key and the
/// address are non-empty. Whether they form a usable account is decided later,
/// against the system config.
#[derive(Clone, Debug)]
pub struct SubkeyConfig {
    env: Environment,
    l2_private_key: SecretString,
    l2_address: String,
}

impl SubkeyConfig {
    /// Checks, in order: environment, private key, address. The first failure wins.
    pub fn new(
        env: Option<Environment>,
        l2_private_key: Option<SecretString>,
        l2_address: Option<String>,
    ) -> Result<Self> {
        let Some(env) = env else {
            return Err(Error::validation("invalid environment"));
        };
        let l2_private_key = l2_private_key
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or_else(|| Error::validation("L2 private key is required"))?;
        let l2_address = l2_address
            .filter(|address| !address.trim().is_empty())
            .ok_or_else(|| Error::validation("L2 address is required"))?;

        Ok(Self {
            env,
            l2_private_key,
            l2_address,
        })
    }

    pub fn from_raw(raw: RawSubkeyConfig) -> Result<Self> {
        let env = match raw.env.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => Some(Environment::parse(value)?),
        };

        Self::new(env, raw.l2_private_key, raw.l2_address)
    }

    #[must_use]
    pub fn env(&self) -> Environment {
        self.env
    }

    #[must_use]
    pub fn l2_address(&self) -> &str {
        &self.l2_address
    }

    /// Hands the credential material over; nothing is kept behind.
    pub(crate) fn into_credentials(self) -> (SecretString, String) {
        (self.l2_private_key, self.l2_address)
    }
}

/// Optional knobs, each falling back independently.
///
/// `logger` replaces the process-wide default subscriber for this client's events.
/// `ws_timeout` replaces the streaming channel's default read timeout.
#[derive(Clone, Debug, Default, Builder)]
pub struct SubkeyOptions {
    logger: Option<Dispatch>,
    ws_timeout: Option<Duration>,
}

impl SubkeyOptions {
    #[must_use]
    pub fn logger(&self) -> Option<&Dispatch> {
        self.logger.as_ref()
    }

    #[must_use]
    pub fn ws_timeout(&self) -> Option<Duration> {
        self.ws_timeout
    }

    pub(crate) fn into_parts(self) -> (Option<Dispatch>, Option<Duration>) {
        (self.logger, self.ws_timeout)
    }
}

impl RawSubkeyConfig {
    /// Options carried alongside the credentials in raw config.
    #[must_use]
    pub fn options(&self, logger: Option<Dispatch>) -> SubkeyOptions {
        SubkeyOptions {
            logger,
            ws_timeout: self.ws_timeout_secs.map(Duration::from_secs),
        }
    }
}
