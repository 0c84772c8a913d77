use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt as _, Stream, StreamExt as _};
use secrecy::ExposeSecret as _;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{Mutex, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use crate::Result;
use crate::account::SubkeyAccount;
use crate::environment::Environment;
use crate::error::Error;
use crate::logging::Logger;
use crate::transport::StreamTransport;
use crate::ws::types::{RpcFrame, RpcRequest, SubscriptionMessage};

/// Read timeout applied when the caller does not override it.
pub const DEFAULT_WS_TIMEOUT: Duration = Duration::from_secs(20);

const SUBSCRIPTION_METHOD: &str = "subscription";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Completes the caller waiting on a request id.
type Ack = oneshot::Sender<Result<()>>;

/// What a single inbound frame turned into.
enum Routed {
    Message(SubscriptionMessage),
    Consumed,
}

/// JSON-RPC streaming client for one [`Environment`].
///
/// When an account is bound, [`WsClient::connect`] authenticates the session with
/// the JWT the REST channel stored on that account.
///
/// The socket is split into a write half and a read half, each behind its own
/// lock, so requests go out while a reader is parked in [`WsClient::next_message`].
/// Whoever holds the read half routes acknowledgements to the waiting request and
/// queues pushed messages it is not interested in.
pub struct WsClient {
    env: Environment,
    url: Url,
    logger: Logger,
    ws_timeout: Option<Duration>,
    account: Option<Arc<SubkeyAccount>>,
    sink: Mutex<Option<WsSink>>,
    source: Mutex<Option<WsSource>>,
    pending: DashMap<u64, Ack>,
    queued: Mutex<VecDeque<SubscriptionMessage>>,
    next_id: AtomicU64,
}

impl WsClient {
    pub fn new(env: Environment, logger: Logger, ws_timeout: Option<Duration>) -> Result<Self> {
        Self::with_url(env, Url::parse(env.ws_url())?, logger, ws_timeout)
    }

    /// Points the client at a URL other than the environment's default.
    pub fn with_url(
        env: Environment,
        url: Url,
        logger: Logger,
        ws_timeout: Option<Duration>,
    ) -> Result<Self> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!("invalid websocket url: {url}")));
        }
        if ws_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::validation("ws_timeout must be greater than zero"));
        }

        Ok(Self {
            env,
            url,
            logger,
            ws_timeout,
            account: None,
            sink: Mutex::new(None),
            source: Mutex::new(None),
            pending: DashMap::new(),
            queued: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub fn env(&self) -> Environment {
        self.env
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The override passed at construction, if any.
    #[must_use]
    pub fn ws_timeout(&self) -> Option<Duration> {
        self.ws_timeout
    }

    /// Effective bound on every read and on every request's acknowledgement.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        self.ws_timeout.unwrap_or(DEFAULT_WS_TIMEOUT)
    }

    pub async fn is_connected(&self) -> bool {
        self.sink.lock().await.is_some()
    }

    /// Opens the socket and, with an account bound, runs the `auth` handshake.
    ///
    /// Replaces any existing connection. A rejected handshake leaves the client
    /// disconnected.
    pub async fn connect(&self) -> Result<()> {
        let bearer = match &self.account {
            Some(account) => Some(account.jwt()?.ok_or_else(|| {
                Error::validation("account has no session token; authenticate the API client first")
            })?),
            None => None,
        };

        let (stream, response) = connect_async(self.url.as_str()).await?;
        self.logger.in_scope(|| {
            info!(url = %self.url, status = %response.status(), "websocket connected");
        });

        let (sink, source) = stream.split();
        *self.sink.lock().await = Some(sink);
        *self.source.lock().await = Some(source);
        self.queued.lock().await.clear();

        if let Some(bearer) = bearer {
            let params = json!({ "bearer": bearer.expose_secret() });
            if let Err(e) = self.request("auth", params).await {
                let mut source = self.source.lock().await;
                self.release(&mut source).await;
                return Err(e);
            }

            self.logger.in_scope(|| info!(env = %self.env, "websocket session authenticated"));
        }

        Ok(())
    }

    /// Subscribes to `channel` and waits for the server to acknowledge it.
    pub async fn subscribe(&self, channel: &str) -> Result<()> {
        self.request("subscribe", json!({ "channel": channel })).await?;
        self.logger.in_scope(|| debug!(channel, "subscribed"));
        Ok(())
    }

    pub async fn unsubscribe(&self, channel: &str) -> Result<()> {
        self.request("unsubscribe", json!({ "channel": channel })).await?;
        self.logger.in_scope(|| debug!(channel, "unsubscribed"));
        Ok(())
    }

    /// Waits for the next pushed message.
    ///
    /// Acknowledgements are handed to their requests, other notifications are
    /// skipped and pings answered. Returns `None` once the server closes the
    /// connection.
    pub async fn next_message(&self) -> Result<Option<SubscriptionMessage>> {
        let mut source = self.source.lock().await;

        loop {
            if let Some(message) = self.queued.lock().await.pop_front() {
                return Ok(Some(message));
            }

            match self.read_routed(&mut source).await? {
                Some(Routed::Message(message)) => return Ok(Some(message)),
                Some(Routed::Consumed) => {}
                None => {
                    self.release(&mut source).await;
                    self.logger.in_scope(|| warn!(url = %self.url, "websocket closed by server"));
                    return Ok(None);
                }
            }
        }
    }

    /// Pushed messages as a stream, ending when the server closes the connection.
    pub fn messages(&self) -> impl Stream<Item = Result<SubscriptionMessage>> + '_ {
        async_stream::try_stream! {
            while let Some(message) = self.next_message().await? {
                yield message;
            }
        }
    }

    /// Sends the close frame and drops the connection.
    ///
    /// Does not wait for a parked reader; it sees the close handshake and returns `None`.
    pub async fn close(&self) -> Result<()> {
        let sink = self.sink.lock().await.take();
        if let Ok(mut source) = self.source.try_lock() {
            source.take();
        }
        self.pending.clear();

        if let Some(mut sink) = sink {
            sink.close().await?;
            self.logger.in_scope(|| info!(url = %self.url, "websocket closed"));
        }
        Ok(())
    }

    /// Sends a request and waits for the response carrying its id.
    async fn request(&self, method: &str, params: Value) -> Result<()> {
        let id = self.next_id();
        let (ack, acked) = oneshot::channel();
        self.pending.insert(id, ack);

        let outcome = async {
            self.send(&RpcRequest::new(id, method, params)).await?;
            timeout(self.read_timeout(), self.await_ack(acked)).await?
        }
        .await;

        self.pending.remove(&id);
        outcome
    }

    /// Resolves once the read half routes our response, reading it ourselves
    /// when nobody else holds the read half.
    async fn await_ack(&self, mut acked: oneshot::Receiver<Result<()>>) -> Result<()> {
        loop {
            tokio::select! {
                outcome = &mut acked => {
                    return outcome.unwrap_or_else(|_| Err(closed_before_response()));
                }
                mut source = self.source.lock() => {
                    match acked.try_recv() {
                        Ok(outcome) => return outcome,
                        Err(TryRecvError::Closed) => return Err(closed_before_response()),
                        Err(TryRecvError::Empty) => {}
                    }

                    match self.read_routed(&mut source).await? {
                        Some(Routed::Message(message)) => self.queued.lock().await.push_back(message),
                        Some(Routed::Consumed) => {}
                        None => {
                            self.release(&mut source).await;
                            return Err(closed_before_response());
                        }
                    }
                }
            }
        }
    }

    async fn send(&self, request: &RpcRequest<'_>) -> Result<()> {
        let text = serde_json::to_string(request)?;
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or_else(not_connected)?;
        sink.send(Message::text(text)).await?;
        Ok(())
    }

    /// Reads one frame from the held read half and routes it. `None` means the connection closed.
    async fn read_routed(&self, source: &mut Option<WsSource>) -> Result<Option<Routed>> {
        let stream = source.as_mut().ok_or_else(not_connected)?;
        let Some(frame) = read_frame(stream, &self.sink, self.read_timeout()).await? else {
            return Ok(None);
        };
        self.route(frame).map(Some)
    }

    fn route(&self, frame: RpcFrame) -> Result<Routed> {
        if let Some(id) = frame.id
            && let Some((_, ack)) = self.pending.remove(&id)
        {
            let outcome = match frame.error {
                Some(error) => Err(Error::websocket(error.code, error.message)),
                None => Ok(()),
            };
            if ack.send(outcome).is_err() {
                self.logger.in_scope(|| debug!(id, "response arrived after its request gave up"));
            }
            return Ok(Routed::Consumed);
        }

        if let Some(error) = frame.error {
            return Err(Error::websocket(error.code, error.message));
        }

        match (frame.method.as_deref(), frame.params) {
            (Some(SUBSCRIPTION_METHOD), Some(params)) => {
                Ok(Routed::Message(serde_json::from_value(params)?))
            }
            (method, _) => {
                self.logger.in_scope(|| debug!(id = ?frame.id, method, "skipping frame"));
                Ok(Routed::Consumed)
            }
        }
    }

    /// Drops both halves; requests still waiting fail as closed.
    async fn release(&self, source: &mut Option<WsSource>) {
        *source = None;
        self.sink.lock().await.take();
        self.pending.clear();
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl StreamTransport for WsClient {
    fn init_account(&mut self, account: Arc<SubkeyAccount>) {
        self.logger
            .in_scope(|| debug!(account = %account.address(), "websocket client bound to account"));
        self.account = Some(account);
    }

    fn account(&self) -> Option<&Arc<SubkeyAccount>> {
        self.account.as_ref()
    }
}

impl fmt::Debug for WsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsClient")
            .field("env", &self.env)
            .field("url", &self.url.as_str())
            .field("ws_timeout", &self.ws_timeout)
            .field("account", &self.account.as_ref().map(|a| a.address()))
            .finish_non_exhaustive()
    }
}

fn not_connected() -> Error {
    Error::validation("websocket is not connected")
}

fn closed_before_response() -> Error {
    Error::websocket(None, "connection closed before response")
}

/// Reads until a text frame arrives, answering pings on `sink`. `None` means the connection closed.
async fn read_frame(
    stream: &mut WsSource,
    sink: &Mutex<Option<WsSink>>,
    read_timeout: Duration,
) -> Result<Option<RpcFrame>> {
    loop {
        let Some(message) = timeout(read_timeout, stream.next()).await? else {
            return Ok(None);
        };

        match message? {
            Message::Text(text) => return Ok(Some(serde_json::from_str(text.as_str())?)),
            Message::Ping(payload) => {
                if let Some(sink) = sink.lock().await.as_mut() {
                    sink.send(Message::Pong(payload)).await?;
                }
            }
            Message::Close(_) => return Ok(None),
            _ => {}
        }
    }
}
