mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret as _, SecretString};
use varen_client_sdk::api::SystemConfig;
use varen_client_sdk::error::{Kind, Validation};
use varen_client_sdk::logging::Logger;
use varen_client_sdk::transport::{
    ApiTransport, StreamTransport, TransportFactory, Transports,
};
use varen_client_sdk::types::Address;
use varen_client_sdk::ws::DEFAULT_WS_TIMEOUT;
use varen_client_sdk::{
    AccountInitializer, Environment, Error, Result, SubkeyAccount, SubkeyConfig, SubkeyOptions,
    VarenSubkey,
};

#[derive(Clone, Debug, PartialEq)]
enum Event {
    ApiCreated(Environment),
    WsCreated(Environment, Option<Duration>),
    FetchConfig,
    AccountBuilt(String, String),
    ApiBound(Address),
    WsBound(Address),
}

#[derive(Clone, Debug, Default)]
struct Log(Arc<Mutex<Vec<Event>>>);

impl Log {
    fn push(&self, event: Event) {
        self.0.lock().expect("log lock").push(event);
    }

    fn events(&self) -> Vec<Event> {
        self.0.lock().expect("log lock").clone()
    }
}

#[derive(Debug)]
struct FakeFactory {
    log: Log,
    fail_fetch: bool,
}

impl FakeFactory {
    fn new() -> Self {
        Self {
            log: Log::default(),
            fail_fetch: false,
        }
    }

    fn failing_fetch() -> Self {
        Self {
            log: Log::default(),
            fail_fetch: true,
        }
    }
}

#[derive(Debug)]
struct FakeApi {
    log: Log,
    fail_fetch: bool,
    account: Option<Arc<SubkeyAccount>>,
}

#[derive(Debug)]
struct FakeStream {
    log: Log,
    ws_timeout: Option<Duration>,
    account: Option<Arc<SubkeyAccount>>,
}

#[async_trait]
impl ApiTransport for FakeApi {
    async fn fetch_system_config(&self) -> Result<SystemConfig> {
        self.log.push(Event::FetchConfig);
        if self.fail_fetch {
            return Err(Error::status(
                StatusCode::SERVICE_UNAVAILABLE,
                Method::GET,
                "/v1/system/config".to_owned(),
                "maintenance",
            ));
        }
        Ok(common::system_config())
    }

    fn init_account(&mut self, account: Arc<SubkeyAccount>) {
        self.log.push(Event::ApiBound(account.address()));
        self.account = Some(account);
    }

    fn account(&self) -> Option<&Arc<SubkeyAccount>> {
        self.account.as_ref()
    }
}

impl StreamTransport for FakeStream {
    fn init_account(&mut self, account: Arc<SubkeyAccount>) {
        self.log.push(Event::WsBound(account.address()));
        self.account = Some(account);
    }

    fn account(&self) -> Option<&Arc<SubkeyAccount>> {
        self.account.as_ref()
    }
}

impl TransportFactory for FakeFactory {
    type Api = FakeApi;
    type Stream = FakeStream;

    fn api_client(&self, env: Environment, _logger: &Logger) -> Result<FakeApi> {
        self.log.push(Event::ApiCreated(env));
        Ok(FakeApi {
            log: self.log.clone(),
            fail_fetch: self.fail_fetch,
            account: None,
        })
    }

    fn ws_client(
        &self,
        env: Environment,
        _logger: &Logger,
        ws_timeout: Option<Duration>,
    ) -> Result<FakeStream> {
        self.log.push(Event::WsCreated(env, ws_timeout));
        Ok(FakeStream {
            log: self.log.clone(),
            ws_timeout,
            account: None,
        })
    }

    fn account(
        &self,
        config: &SystemConfig,
        l2_private_key: SecretString,
        l2_address: &str,
    ) -> Result<SubkeyAccount> {
        self.log.push(Event::AccountBuilt(
            l2_private_key.expose_secret().to_owned(),
            l2_address.to_owned(),
        ));
        SubkeyAccount::new(config, l2_private_key, l2_address)
    }
}

async fn bring_up(
    factory: &FakeFactory,
    env: Option<Environment>,
    l2_private_key: Option<&str>,
    l2_address: Option<&str>,
    options: SubkeyOptions,
) -> Result<VarenSubkey<FakeApi, FakeStream>> {
    let config = SubkeyConfig::new(
        env,
        l2_private_key.map(SecretString::from),
        l2_address.map(str::to_owned),
    )?;
    VarenSubkey::with_transports(factory, config, options).await
}

fn reason(err: &Error) -> &str {
    &err.downcast_ref::<Validation>()
        .expect("validation payload")
        .reason
}

fn main_account() -> Address {
    common::MAIN_ACCOUNT.parse().expect("valid address")
}

#[tokio::test]
async fn missing_environment_should_fail_before_any_transport() {
    let factory = FakeFactory::new();

    let err = bring_up(
        &factory,
        None,
        Some(common::PRIVATE_KEY),
        Some(common::MAIN_ACCOUNT),
        SubkeyOptions::default(),
    )
    .await
    .expect_err("environment is required");

    assert_eq!(err.kind(), Kind::Validation, "kind should be Validation");
    assert_eq!(reason(&err), "invalid environment");
    assert!(factory.log.events().is_empty(), "no transport may be created");
}

#[tokio::test]
async fn missing_or_empty_key_should_fail_before_config_fetch() {
    for key in [None, Some("")] {
        let factory = FakeFactory::new();

        let err = bring_up(
            &factory,
            Some(Environment::Testnet),
            key,
            Some(common::MAIN_ACCOUNT),
            SubkeyOptions::default(),
        )
        .await
        .expect_err("private key is required");

        assert_eq!(reason(&err), "L2 private key is required");
        assert!(
            !factory.log.events().contains(&Event::FetchConfig),
            "config must not be fetched for key {key:?}"
        );
    }
}

#[tokio::test]
async fn missing_or_empty_address_should_fail() {
    for address in [None, Some("")] {
        let factory = FakeFactory::new();

        let err = bring_up(
            &factory,
            Some(Environment::Testnet),
            Some(common::PRIVATE_KEY),
            address,
            SubkeyOptions::default(),
        )
        .await
        .expect_err("address is required");

        assert_eq!(reason(&err), "L2 address is required");
        assert!(factory.log.events().is_empty(), "no transport may be created");
    }
}

#[tokio::test]
async fn both_transports_should_share_one_account() -> anyhow::Result<()> {
    let factory = FakeFactory::new();

    let varen = bring_up(
        &factory,
        Some(Environment::Testnet),
        Some(common::PRIVATE_KEY),
        Some(common::MAIN_ACCOUNT),
        SubkeyOptions::default(),
    )
    .await?;

    let api_account = varen.api_client().account().expect("api bound");
    let ws_account = varen.ws_client().account().expect("ws bound");
    assert!(Arc::ptr_eq(api_account, ws_account), "same instance on both channels");
    assert!(Arc::ptr_eq(api_account, varen.account()), "root holds the same instance");
    assert_eq!(varen.account().address(), main_account());
    assert_eq!(varen.config().chain_id, 421_614);
    assert_eq!(varen.env(), Environment::Testnet);

    assert_eq!(
        factory.log.events(),
        vec![
            Event::ApiCreated(Environment::Testnet),
            Event::WsCreated(Environment::Testnet, None),
            Event::FetchConfig,
            Event::AccountBuilt(common::PRIVATE_KEY.to_owned(), common::MAIN_ACCOUNT.to_owned()),
            Event::ApiBound(main_account()),
            Event::WsBound(main_account()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn failed_config_fetch_should_not_build_account() {
    let factory = FakeFactory::failing_fetch();

    let err = bring_up(
        &factory,
        Some(Environment::Prod),
        Some(common::PRIVATE_KEY),
        Some(common::MAIN_ACCOUNT),
        SubkeyOptions::default(),
    )
    .await
    .expect_err("config fetch fails");

    assert_eq!(err.kind(), Kind::Status, "fetch error propagates unchanged");
    assert_eq!(
        factory.log.events(),
        vec![
            Event::ApiCreated(Environment::Prod),
            Event::WsCreated(Environment::Prod, None),
            Event::FetchConfig,
        ]
    );
}

#[tokio::test]
async fn short_hex_credentials_should_bind_one_account() -> anyhow::Result<()> {
    let factory = FakeFactory::new();

    let varen = bring_up(
        &factory,
        Some(Environment::Testnet),
        Some("0xABC"),
        Some("0xDEF"),
        SubkeyOptions::default(),
    )
    .await?;

    let api_account = varen.api_client().account().expect("api bound");
    let ws_account = varen.ws_client().account().expect("ws bound");
    assert!(Arc::ptr_eq(api_account, ws_account), "same instance on both channels");
    assert!(Arc::ptr_eq(api_account, varen.account()), "root holds the same instance");

    let padded: Address = "0x0000000000000000000000000000000000000def".parse()?;
    assert_eq!(varen.account().address(), padded);
    assert!(
        factory
            .log
            .events()
            .contains(&Event::AccountBuilt("0xABC".to_owned(), "0xDEF".to_owned())),
        "credentials reach the account constructor unchanged"
    );
    Ok(())
}

#[tokio::test]
async fn malformed_key_should_fail_after_fetch_without_binding() {
    let factory = FakeFactory::new();

    let err = bring_up(
        &factory,
        Some(Environment::Testnet),
        Some("not-a-key"),
        Some(common::MAIN_ACCOUNT),
        SubkeyOptions::default(),
    )
    .await
    .expect_err("non-hex key is unusable");

    assert_eq!(err.kind(), Kind::Validation, "kind should be Validation");
    assert!(
        reason(&err).starts_with("invalid L2 private key"),
        "unexpected reason: {}",
        reason(&err)
    );

    let events = factory.log.events();
    assert!(events.contains(&Event::FetchConfig), "config was fetched first");
    assert!(
        events.iter().any(|e| matches!(e, Event::AccountBuilt(..))),
        "account construction was attempted: {events:?}"
    );
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, Event::ApiBound(_) | Event::WsBound(_))),
        "no transport may be bound: {events:?}"
    );
}

#[tokio::test]
async fn init_account_should_return_bound_instance_every_time() -> anyhow::Result<()> {
    let factory = FakeFactory::new();
    let varen = bring_up(
        &factory,
        Some(Environment::Testnet),
        Some(common::PRIVATE_KEY),
        Some(common::MAIN_ACCOUNT),
        SubkeyOptions::default(),
    )
    .await?;
    let events_after_construction = factory.log.events();

    let first = varen.init_account().await;
    let second = varen.init_account().await;

    assert!(Arc::ptr_eq(&first, &second), "hook is idempotent");
    let bound = varen.api_client().account().expect("api bound");
    assert!(Arc::ptr_eq(&first, bound), "hook returns the bound account");
    assert_eq!(
        factory.log.events(),
        events_after_construction,
        "hook has no side effects on transports"
    );
    Ok(())
}

async fn ready<I: AccountInitializer>(initializer: &I) -> Result<Arc<I::Account>> {
    initializer.ensure_initialized().await
}

#[tokio::test]
async fn client_should_act_as_account_initializer() -> anyhow::Result<()> {
    let factory = FakeFactory::new();
    let varen = bring_up(
        &factory,
        Some(Environment::Testnet),
        Some(common::PRIVATE_KEY),
        Some(common::MAIN_ACCOUNT),
        SubkeyOptions::default(),
    )
    .await?;

    let account = ready(&varen).await?;

    assert!(Arc::ptr_eq(&account, varen.account()), "same account instance");
    Ok(())
}

#[tokio::test]
async fn ws_timeout_should_reach_stream_transport() -> anyhow::Result<()> {
    let factory = FakeFactory::new();
    let options = SubkeyOptions::builder()
        .ws_timeout(Duration::from_secs(30))
        .build();

    let varen = bring_up(
        &factory,
        Some(Environment::Testnet),
        Some(common::PRIVATE_KEY),
        Some(common::MAIN_ACCOUNT),
        options,
    )
    .await?;

    assert_eq!(varen.ws_client().ws_timeout, Some(Duration::from_secs(30)));
    assert!(
        factory
            .log
            .events()
            .contains(&Event::WsCreated(Environment::Testnet, Some(Duration::from_secs(30)))),
        "factory saw the override"
    );
    Ok(())
}

#[test]
fn omitted_ws_timeout_should_use_transport_default() -> anyhow::Result<()> {
    let ws = Transports.ws_client(Environment::Testnet, &Logger::default(), None)?;
    assert_eq!(ws.ws_timeout(), None);
    assert_eq!(ws.read_timeout(), DEFAULT_WS_TIMEOUT);

    let ws = Transports.ws_client(
        Environment::Testnet,
        &Logger::default(),
        Some(Duration::from_secs(3)),
    )?;
    assert_eq!(ws.read_timeout(), Duration::from_secs(3));
    Ok(())
}

#[tokio::test]
async fn injected_logger_should_receive_events() -> anyhow::Result<()> {
    let capture = common::Capture::default();
    let factory = FakeFactory::new();
    let options = SubkeyOptions::builder().logger(capture.dispatch()).build();

    let varen = bring_up(
        &factory,
        Some(Environment::Testnet),
        Some(common::PRIVATE_KEY),
        Some(common::MAIN_ACCOUNT),
        options,
    )
    .await?;
    varen.init_account().await;
    varen.init_account().await;

    let output = capture.contents();
    assert!(output.contains("subkey client ready"), "output: {output}");
    assert_eq!(
        output
            .matches("SubkeyAccount already initialized in constructor")
            .count(),
        2,
        "output: {output}"
    );
    Ok(())
}

#[tokio::test]
async fn builder_should_validate_before_network() {
    let err = VarenSubkey::builder()
        .env(Environment::Testnet)
        .l2_address(common::MAIN_ACCOUNT)
        .build()
        .await
        .expect_err("private key missing");

    assert_eq!(reason(&err), "L2 private key is required");
}
