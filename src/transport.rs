//! Seams between the composition root and its two channels.
//!
//! Both channels receive the same [`Arc<SubkeyAccount>`]: the root is the only
//! writer at bind time, the transports only read it afterwards.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::Result;
use crate::account::SubkeyAccount;
use crate::api::{ApiClient, SystemConfig};
use crate::environment::Environment;
use crate::logging::Logger;
use crate::ws::WsClient;

/// Request/response channel.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn fetch_system_config(&self) -> Result<SystemConfig>;

    /// Binds the identity used for authenticated calls.
    fn init_account(&mut self, account: Arc<SubkeyAccount>);

    fn account(&self) -> Option<&Arc<SubkeyAccount>>;
}

/// Persistent streaming channel.
pub trait StreamTransport: Send + Sync {
    /// Binds the identity used for the session handshake.
    fn init_account(&mut self, account: Arc<SubkeyAccount>);

    fn account(&self) -> Option<&Arc<SubkeyAccount>>;
}

/// Builds both channels for an environment, and the account they share.
pub trait TransportFactory {
    type Api: ApiTransport;
    type Stream: StreamTransport;

    fn api_client(&self, env: Environment, logger: &Logger) -> Result<Self::Api>;

    /// `ws_timeout` of `None` leaves the channel's own default in place.
    fn ws_client(
        &self,
        env: Environment,
        logger: &Logger,
        ws_timeout: Option<Duration>,
    ) -> Result<Self::Stream>;

    /// Builds the account bound into both channels once the config is known.
    fn account(
        &self,
        config: &SystemConfig,
        l2_private_key: SecretString,
        l2_address: &str,
    ) -> Result<SubkeyAccount> {
        SubkeyAccount::new(config, l2_private_key, l2_address)
    }
}

/// Production factory: [`ApiClient`] and [`WsClient`] against the environment's hosts.
#[derive(Clone, Copy, Debug, Default)]
pub struct Transports;

impl TransportFactory for Transports {
    type Api = ApiClient;
    type Stream = WsClient;

    fn api_client(&self, env: Environment, logger: &Logger) -> Result<ApiClient> {
        ApiClient::new(env, logger.clone())
    }

    fn ws_client(
        &self,
        env: Environment,
        logger: &Logger,
        ws_timeout: Option<Duration>,
    ) -> Result<WsClient> {
        WsClient::new(env, logger.clone(), ws_timeout)
    }
}
