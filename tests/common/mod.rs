//! In-process feed server for integration tests.
//!
//! Serves the feed path on an ephemeral port with axum's WebSocket upgrade.
//! Frames pushed through [`TestServer::push_text`] are written to the first
//! client that connects; everything that client sends is reported on
//! [`TestServer::inbound`].

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};

use broterm_feed::config::{DEFAULT_FEED_PATH, FeedConfig};

/// Token the server accepts.
pub const TEST_TOKEN: &str = "test-token";

/// How the server reacts to the client's close frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Complete the close handshake.
    Acknowledge,
    /// Hold every socket open and never read from it.
    Ignore,
}

/// Something the server received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame.
    Text(String),
    /// A keepalive ping.
    Ping,
    /// The client's close frame.
    Close(Option<u16>),
}

/// Frame the test asks the server to write.
#[derive(Debug)]
pub enum Push {
    /// A text frame.
    Text(String),
    /// A close frame with the given code.
    Close(u16),
}

#[derive(Debug, Clone)]
struct ServerState {
    mode: CloseMode,
    outbound: Arc<Mutex<Option<mpsc::UnboundedReceiver<Push>>>>,
    inbound: mpsc::UnboundedSender<Inbound>,
}

/// Handle to a running test server.
#[derive(Debug)]
pub struct TestServer {
    /// Bound address.
    pub addr: SocketAddr,
    /// Frames received from the client.
    pub inbound: mpsc::UnboundedReceiver<Inbound>,
    push: mpsc::UnboundedSender<Push>,
}

impl TestServer {
    /// Starts a server that acknowledges the close handshake.
    pub async fn start() -> Self {
        Self::start_with(CloseMode::Acknowledge).await
    }

    /// Starts a server with the given close behavior.
    pub async fn start_with(mode: CloseMode) -> Self {
        let (push, outbound) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let state = ServerState {
            mode,
            outbound: Arc::new(Mutex::new(Some(outbound))),
            inbound: inbound_tx,
        };

        let app = Router::new()
            .route(DEFAULT_FEED_PATH, get(feed_handler))
            .with_state(state);

        let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
            panic!("failed to bind test listener");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("listener has no local address");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            inbound,
            push,
        }
    }

    /// Client configuration pointing at this server with short timings.
    pub fn config(&self) -> FeedConfig {
        FeedConfig {
            keepalive_interval: Duration::from_secs(30),
            shutdown_timeout: Duration::from_millis(500),
            handshake_timeout: Duration::from_secs(2),
            ..FeedConfig::for_host(self.addr.to_string())
        }
    }

    /// Writes a text frame to the connected client.
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.push.send(Push::Text(text.into()));
    }

    /// Closes the connection from the server side with `code`.
    pub fn push_close(&self, code: u16) {
        let _ = self.push.send(Push::Close(code));
    }

    /// Waits up to a second for the next inbound frame, skipping pings.
    pub async fn next_non_ping(&mut self) -> Option<Inbound> {
        loop {
            let next = tokio::time::timeout(Duration::from_secs(1), self.inbound.recv())
                .await
                .ok()
                .flatten()?;
            if next != Inbound::Ping {
                return Some(next);
            }
        }
    }
}

async fn feed_handler(
    State(state): State<ServerState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let expected = format!("Bearer {TEST_TOKEN}");
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(socket: WebSocket, state: ServerState) {
    if state.mode == CloseMode::Ignore {
        let _held = socket;
        std::future::pending::<()>().await;
        return;
    }

    let Some(mut outbound) = state.outbound.lock().await.take() else {
        return;
    };

    let (mut tx, mut rx) = socket.split();
    loop {
        tokio::select! {
            push = outbound.recv() => match push {
                Some(Push::Text(text)) => {
                    if tx.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }
                Some(Push::Close(code)) => {
                    let frame = CloseFrame {
                        code,
                        reason: Utf8Bytes::from_static("server going away"),
                    };
                    let _ = tx.send(Message::Close(Some(frame))).await;
                    // Keep reading so the client's reply is consumed.
                    while let Some(Ok(_)) = rx.next().await {}
                    break;
                }
                None => break,
            },
            msg = rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = state.inbound.send(Inbound::Text(text.as_str().to_owned()));
                }
                Some(Ok(Message::Ping(_))) => {
                    let _ = state.inbound.send(Inbound::Ping);
                }
                Some(Ok(Message::Close(frame))) => {
                    let _ = state.inbound.send(Inbound::Close(frame.map(|f| f.code)));
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
        }
    }
}
