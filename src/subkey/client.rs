use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bon::bon;
use secrecy::SecretString;
use tracing::{Dispatch, info};

use crate::Result;
use crate::account::SubkeyAccount;
use crate::api::{ApiClient, SystemConfig};
use crate::environment::Environment;
use crate::initializer::AccountInitializer;
use crate::logging::Logger;
use crate::subkey::{RawSubkeyConfig, SubkeyConfig, SubkeyOptions};
use crate::transport::{ApiTransport, StreamTransport, TransportFactory, Transports};
use crate::ws::WsClient;

/// Client authenticated with an L2 subkey only.
///
/// Construction validates the credentials, fetches the system config, builds a
/// [`SubkeyAccount`] and binds that one account into both the REST and the
/// streaming channel. It either returns a fully bound client or an error.
#[derive(Debug)]
pub struct VarenSubkey<A = ApiClient, W = WsClient> {
    env: Environment,
    logger: Logger,
    config: SystemConfig,
    account: Arc<SubkeyAccount>,
    api_client: A,
    ws_client: W,
}

#[bon]
impl VarenSubkey {
    /// Connects against the environment's production hosts.
    ///
    /// ```no_run
    /// # async fn run() -> varen_client_sdk::Result<()> {
    /// use std::time::Duration;
    ///
    /// use varen_client_sdk::{Environment, VarenSubkey};
    ///
    /// let _varen = VarenSubkey::builder()
    ///     .env(Environment::Testnet)
    ///     .l2_private_key("0x...")
    ///     .l2_address("0x...")
    ///     .ws_timeout(Duration::from_secs(30))
    ///     .build()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn new(
        env: Option<Environment>,
        #[builder(into)] l2_private_key: Option<SecretString>,
        #[builder(into)] l2_address: Option<String>,
        logger: Option<Dispatch>,
        ws_timeout: Option<Duration>,
    ) -> Result<Self> {
        let config = SubkeyConfig::new(env, l2_private_key, l2_address)?;
        let options = SubkeyOptions::builder()
            .maybe_logger(logger)
            .maybe_ws_timeout(ws_timeout)
            .build();

        Self::with_transports(&Transports, config, options).await
    }

    pub async fn from_raw(raw: RawSubkeyConfig, logger: Option<Dispatch>) -> Result<Self> {
        let options = raw.options(logger);
        let config = SubkeyConfig::from_raw(raw)?;

        Self::with_transports(&Transports, config, options).await
    }
}

impl<A: ApiTransport, W: StreamTransport> VarenSubkey<A, W> {
    /// Runs the bring-up sequence with transports built by `factory`.
    ///
    /// Config fetch and account construction failures are returned unchanged;
    /// neither channel is bound unless the account was built.
    pub async fn with_transports<F>(
        factory: &F,
        config: SubkeyConfig,
        options: SubkeyOptions,
    ) -> Result<Self>
    where
        F: TransportFactory<Api = A, Stream = W>,
    {
        let (dispatch, ws_timeout) = options.into_parts();
        let logger = Logger::from(dispatch);
        let env = config.env();

        let mut api_client = factory.api_client(env, &logger)?;
        let mut ws_client = factory.ws_client(env, &logger, ws_timeout)?;

        let system_config = api_client.fetch_system_config().await?;

        let (l2_private_key, l2_address) = config.into_credentials();
        let account = Arc::new(factory.account(&system_config, l2_private_key, &l2_address)?);

        api_client.init_account(Arc::clone(&account));
        ws_client.init_account(Arc::clone(&account));

        logger.in_scope(|| {
            info!(
                env = %env,
                account = %account.address(),
                signer = %account.signer_address(),
                "subkey client ready"
            );
        });

        Ok(Self {
            env,
            logger,
            config: system_config,
            account,
            api_client,
            ws_client,
        })
    }

    #[must_use]
    pub fn env(&self) -> Environment {
        self.env
    }

    #[must_use]
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    #[must_use]
    pub fn account(&self) -> &Arc<SubkeyAccount> {
        &self.account
    }

    #[must_use]
    pub fn api_client(&self) -> &A {
        &self.api_client
    }

    #[must_use]
    pub fn ws_client(&self) -> &W {
        &self.ws_client
    }

    /// Returns the account bound at construction.
    ///
    /// A subkey account is complete once construction returns, so this only logs
    /// and hands back the same instance. It never suspends and never touches the
    /// scheduler; it is `async` so callers can drive it like variants whose
    /// initialization does real work.
    #[expect(
        clippy::unused_async,
        reason = "async signature shared with account variants that do suspend"
    )]
    pub async fn init_account(&self) -> Arc<SubkeyAccount> {
        self.logger
            .in_scope(|| info!("SubkeyAccount already initialized in constructor"));
        Arc::clone(&self.account)
    }
}

#[async_trait]
impl<A: ApiTransport, W: StreamTransport> AccountInitializer for VarenSubkey<A, W> {
    type Account = SubkeyAccount;

    async fn ensure_initialized(&self) -> Result<Arc<SubkeyAccount>> {
        Ok(self.init_account().await)
    }
}
