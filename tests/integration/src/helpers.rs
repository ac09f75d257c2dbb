//! Test helpers for integration tests
//!
//! A gateway bound to a local port with an in-memory user directory, plus a
//! small WebSocket client that understands coalesced frames.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chat_common::AppConfig;
use chat_core::UserId;
use chat_db::InMemoryUserDirectory;
use chat_gateway::{create_app, GatewayState};
use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Counter for unique test ports
static PORT_COUNTER: AtomicU16 = AtomicU16::new(19000);

/// Signing secret shared by every test server
pub const TEST_SECRET: &str = "integration-test-secret-key-long-enough";

/// How long a client waits for an expected frame
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Get a unique port for testing
pub fn get_test_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: GatewayState,
    pub directory: Arc<InMemoryUserDirectory>,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server
    pub async fn start() -> Result<Self> {
        Self::start_with_config(test_config(&[])?).await
    }

    /// Start a test server with custom config
    pub async fn start_with_config(config: AppConfig) -> Result<Self> {
        let directory = Arc::new(InMemoryUserDirectory::new());
        let state = GatewayState::new(config, directory.clone());
        let app = create_app(state.clone());

        let addr = SocketAddr::from(([127, 0, 0, 1], get_test_port()));
        let listener = TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr: actual_addr,
            client,
            state,
            directory,
            _handle: handle,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// WebSocket URL carrying `token`
    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={token}", self.addr)
    }

    /// Mint an access token for `user_id`
    pub fn token_for(&self, user_id: &str) -> Result<String> {
        Ok(self
            .state
            .jwt_service()
            .issue_access_token(&UserId::new(user_id))?)
    }

    /// Make a friendship between two users
    pub fn befriend(&self, a: &str, b: &str) {
        self.directory
            .add_friendship(&UserId::new(a), &UserId::new(b));
    }

    /// Open a WebSocket as `user_id`
    pub async fn connect(&self, user_id: &str) -> Result<WsClient> {
        let token = self.token_for(user_id)?;
        WsClient::connect(&self.ws_url(&token)).await
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Make a GET request with auth token
    pub async fn get_auth(&self, path: &str, token: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await?)
    }

    /// Wait until the registry agrees on `user_id`'s presence
    pub async fn wait_online(&self, user_id: &str, online: bool) -> Result<()> {
        let user_id = UserId::new(user_id);
        let publisher = self.state.publisher();
        tokio::time::timeout(RECV_TIMEOUT, async {
            while publisher.is_online(&user_id) != online {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .with_context(|| format!("{user_id} never became online={online}"))
    }
}

/// Build a test configuration from defaults plus `overrides`
pub fn test_config(overrides: &[(&str, &str)]) -> Result<AppConfig> {
    let config = AppConfig::from_source(|key| {
        overrides
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| (*v).to_string())
            .or_else(|| (key == "JWT_SECRET").then(|| TEST_SECRET.to_string()))
    })?;
    Ok(config)
}

/// WebSocket client that splits coalesced frames into single events
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pending: VecDeque<Value>,
}

impl WsClient {
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _response) = connect_async(url).await?;
        Ok(Self {
            stream,
            pending: VecDeque::new(),
        })
    }

    /// Send a JSON frame
    pub async fn send_json(&mut self, value: &Value) -> Result<()> {
        self.stream.send(Message::Text(value.to_string())).await?;
        Ok(())
    }

    /// Send a raw text frame
    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Next event, or an error after `RECV_TIMEOUT`
    pub async fn next_event(&mut self) -> Result<Value> {
        self.next_event_within(RECV_TIMEOUT)
            .await?
            .context("timed out waiting for event")
    }

    /// Next event within `wait`, `None` if nothing arrived
    pub async fn next_event_within(&mut self, wait: Duration) -> Result<Option<Value>> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }

        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let Ok(next) = tokio::time::timeout_at(deadline, self.stream.next()).await else {
                return Ok(None);
            };
            match next {
                Some(Ok(Message::Text(text))) => {
                    for line in text.split('\n').filter(|line| !line.is_empty()) {
                        self.pending.push_back(serde_json::from_str(line)?);
                    }
                    if let Some(event) = self.pending.pop_front() {
                        return Ok(Some(event));
                    }
                }
                Some(Ok(Message::Close(frame))) => bail!("connection closed: {frame:?}"),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => bail!("connection ended"),
            }
        }
    }

    /// Next raw text frame, without splitting coalesced envelopes
    pub async fn next_text_frame(&mut self) -> Result<String> {
        if !self.pending.is_empty() {
            bail!("{} split events still pending", self.pending.len());
        }
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        loop {
            let next = tokio::time::timeout_at(deadline, self.stream.next())
                .await
                .context("timed out waiting for text frame")?;
            match next {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Close(frame))) => bail!("connection closed: {frame:?}"),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => bail!("connection ended"),
            }
        }
    }

    /// Skip events until one of `kind` arrives
    pub async fn next_of_kind(&mut self, kind: &str) -> Result<Value> {
        loop {
            let event = self.next_event().await?;
            if event["type"] == kind {
                return Ok(event);
            }
        }
    }

    /// Assert nothing arrives for `wait`
    pub async fn assert_quiet(&mut self, wait: Duration) -> Result<()> {
        if let Some(event) = self.next_event_within(wait).await? {
            bail!("unexpected event: {event}");
        }
        Ok(())
    }

    /// Subscribe and wait until the subscription is live
    ///
    /// A typing event on the same conversation echoes back once the
    /// subscribe frame has been applied.
    pub async fn subscribe(&mut self, conversation_id: &str) -> Result<()> {
        self.send_json(&crate::fixtures::subscribe_frame(conversation_id))
            .await?;
        self.send_json(&crate::fixtures::typing_frame(conversation_id))
            .await?;
        loop {
            let event = self.next_event().await?;
            if event["type"] == "typing" && event["conversationId"] == conversation_id {
                return Ok(());
            }
        }
    }

    /// Wait for the server to close the connection and return its close code
    pub async fn expect_close(&mut self) -> Result<u16> {
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        loop {
            let next = tokio::time::timeout_at(deadline, self.stream.next())
                .await
                .context("timed out waiting for close")?;
            match next {
                Some(Ok(Message::Close(Some(frame)))) => return Ok(u16::from(frame.code)),
                Some(Ok(Message::Close(None))) => bail!("close frame without code"),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => bail!("connection ended without close frame"),
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

/// Assert response status and parse JSON body
pub async fn assert_json<T: DeserializeOwned>(
    response: Response,
    expected_status: StatusCode,
) -> Result<T> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(response.json().await?)
}

/// Assert response status without parsing body
pub async fn assert_status(response: Response, expected_status: StatusCode) -> Result<()> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(())
}
