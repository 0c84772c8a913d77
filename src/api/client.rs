use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client as ReqwestClient;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret as _, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::Result;
use crate::account::SubkeyAccount;
use crate::api::{AccountSummary, AuthResponse, SystemConfig, SystemTime};
use crate::environment::Environment;
use crate::error::Error;
use crate::logging::Logger;
use crate::transport::ApiTransport;

/// REST client for one [`Environment`].
#[derive(Clone, Debug)]
pub struct ApiClient {
    env: Environment,
    host: Url,
    logger: Logger,
    account: Option<Arc<SubkeyAccount>>,
    client: ReqwestClient,
}

impl ApiClient {
    pub fn new(env: Environment, logger: Logger) -> Result<Self> {
        Self::with_host(env, Url::parse(env.api_url())?, logger)
    }

    /// Points the client at a host other than the environment's default.
    pub fn with_host(env: Environment, host: Url, logger: Logger) -> Result<Self> {
        Self::with_client(env, host, logger, ReqwestClient::new())
    }

    pub fn with_client(
        env: Environment,
        host: Url,
        logger: Logger,
        client: ReqwestClient,
    ) -> Result<Self> {
        if host.cannot_be_a_base() {
            return Err(Error::validation(format!("invalid API host: {host}")));
        }

        Ok(Self {
            env,
            host,
            logger,
            account: None,
            client,
        })
    }

    #[must_use]
    pub fn env(&self) -> Environment {
        self.env
    }

    #[must_use]
    pub fn host(&self) -> &Url {
        &self.host
    }

    pub async fn fetch_system_time(&self) -> Result<SystemTime> {
        self.get("system/time", None).await
    }

    /// Signs an auth request with the bound account and stores the returned JWT on it.
    pub async fn auth(&self) -> Result<()> {
        let account = self.bound_account()?;

        let request = self
            .client
            .request(Method::POST, self.endpoint("auth")?)
            .build()?;
        let headers = account
            .auth_headers(request.method(), request.url().path(), Utc::now().timestamp())
            .await?;

        let response =
            crate::request::<AuthResponse>(&self.client, request, Some(headers), &self.logger)
                .await?;
        account.set_jwt(SecretString::from(response.jwt_token))?;

        self.logger.in_scope(|| {
            info!(account = %account.address(), env = %self.env, "authenticated subkey account");
        });
        Ok(())
    }

    /// Fetches the margin summary, authenticating first when no session exists yet.
    pub async fn fetch_account_summary(&self) -> Result<AccountSummary> {
        let headers = self.bearer_headers().await?;
        self.get("account", Some(headers)).await
    }

    async fn bearer_headers(&self) -> Result<HeaderMap> {
        let account = self.bound_account()?;

        let jwt = match account.jwt()? {
            Some(jwt) => jwt,
            None => {
                self.auth().await?;
                account
                    .jwt()?
                    .ok_or_else(|| Error::validation("auth response carried no token"))?
            }
        };

        let mut value = HeaderValue::from_str(&format!("Bearer {}", jwt.expose_secret()))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, headers: Option<HeaderMap>) -> Result<T> {
        let request = self
            .client
            .request(Method::GET, self.endpoint(path)?)
            .build()?;

        self.logger
            .in_scope(|| debug!(url = %request.url(), "GET"));

        crate::request::<T>(&self.client, request, headers, &self.logger).await
    }

    fn bound_account(&self) -> Result<&Arc<SubkeyAccount>> {
        self.account
            .as_ref()
            .ok_or_else(|| Error::validation("no account bound to the API client"))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.host.join(path)?)
    }
}

#[async_trait]
impl ApiTransport for ApiClient {
    async fn fetch_system_config(&self) -> Result<SystemConfig> {
        let config: SystemConfig = self.get("system/config", None).await?;

        self.logger.in_scope(|| {
            info!(env = %self.env, chain_id = config.chain_id, "fetched system config");
        });
        Ok(config)
    }

    fn init_account(&mut self, account: Arc<SubkeyAccount>) {
        self.logger
            .in_scope(|| debug!(account = %account.address(), "API client bound to account"));
        self.account = Some(account);
    }

    fn account(&self) -> Option<&Arc<SubkeyAccount>> {
        self.account.as_ref()
    }
}
