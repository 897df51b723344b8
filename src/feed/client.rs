//! Feed connection manager.
//!
//! [`FeedClient`] owns at most one WebSocket connection to the feed
//! endpoint. A live connection runs four tasks:
//!
//! - **read**: decodes text frames and fans them out through the
//!   [`SubscriptionRegistry`], strictly in wire order;
//! - **write**: owns the socket's sink and drains the outbound queue;
//! - **keepalive**: queues a ping every `keepalive_interval`;
//! - **shutdown**: waits for the session scope to end, queues a
//!   normal-closure frame and waits (bounded by `shutdown_timeout`) for the
//!   peer to finish the handshake before aborting the other tasks, which
//!   drops the socket.
//!
//! Subscriber queues are tied to the session, not to a connection: they
//! are closed when the session ends, whether or not a connection was ever
//! made.
//!
//! Phases: `Disconnected → Connecting → Connected → Closing → Disconnected`.
//! A dropped connection is not retried; the caller decides whether to
//! reconnect or send the user back to login.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message, Utf8Bytes};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::envelope::{self, FeedMessageType};
use super::registry::{Subscription, SubscriptionRegistry};
use crate::config::FeedConfig;
use crate::domain::{
    ChatMessageRequest, EventCategory, MacroRequest, SetActiveChannelRequest, SubscriptionId,
};
use crate::error::FeedError;
use crate::session::{Scope, SessionManager};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

const CLOSE_REASON: &str = "Client closed connection.";

/// Close code reported when the peer's close frame carried no status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Lifecycle phase of the feed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No connection; `connect` may be called.
    Disconnected,
    /// Opening handshake in progress.
    Connecting,
    /// Frames are flowing.
    Connected,
    /// Close handshake in progress.
    Closing,
}

/// Why the last connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The session ended and the client closed the connection.
    Shutdown {
        /// Whether the peer completed the close handshake in time.
        acknowledged: bool,
    },
    /// The server closed the connection.
    ClosedByPeer {
        /// WebSocket close code.
        code: u16,
        /// Close reason text.
        reason: String,
    },
    /// The transport failed.
    Failed(String),
}

impl DisconnectReason {
    /// Returns `true` for client shutdowns and normal/going-away closes.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        match self {
            Self::Shutdown { .. } => true,
            Self::ClosedByPeer { code, .. } => is_clean_close(*code),
            Self::Failed(_) => false,
        }
    }
}

fn is_clean_close(code: u16) -> bool {
    code == u16::from(CloseCode::Normal) || code == u16::from(CloseCode::Away)
}

/// One frame waiting for the write task.
#[derive(Debug)]
struct Outgoing {
    message: Message,
    done: Option<oneshot::Sender<Result<(), FeedError>>>,
}

/// Handles to the tasks of one live connection.
#[derive(Debug)]
struct Connection {
    generation: u64,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    tasks: Vec<AbortHandle>,
}

impl Connection {
    fn abort(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// State shared between the client handle and its connection tasks.
#[derive(Debug)]
struct Shared {
    phase: watch::Sender<ConnectionPhase>,
    connection: Mutex<Option<Connection>>,
    generation: AtomicU64,
    peer_close: Mutex<Option<(u16, String)>>,
    last_disconnect: Mutex<Option<DisconnectReason>>,
}

impl Shared {
    fn new() -> Self {
        let (phase, _) = watch::channel(ConnectionPhase::Disconnected);
        Self {
            phase,
            connection: Mutex::new(None),
            generation: AtomicU64::new(0),
            peer_close: Mutex::new(None),
            last_disconnect: Mutex::new(None),
        }
    }

    fn phase(&self) -> ConnectionPhase {
        *self.phase.borrow()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Queues a frame on the live connection and waits for it to be written.
    async fn send_frame(&self, message: Message) -> Result<(), FeedError> {
        let (done, written) = oneshot::channel();
        {
            let connection = self.connection.lock();
            if self.phase() != ConnectionPhase::Connected {
                return Err(FeedError::NotConnected);
            }
            let Some(connection) = connection.as_ref() else {
                return Err(FeedError::NotConnected);
            };
            connection
                .outgoing
                .send(Outgoing {
                    message,
                    done: Some(done),
                })
                .map_err(|_| FeedError::NotConnected)?;
        }
        // The write task drops `done` unanswered when it is aborted.
        written.await.unwrap_or(Err(FeedError::NotConnected))
    }

    /// Queues a frame for `generation` without waiting for the write.
    ///
    /// Returns `false` if that connection is gone or superseded.
    fn enqueue_for(&self, generation: u64, message: Message) -> bool {
        match self.connection.lock().as_ref() {
            Some(connection) if connection.generation == generation => connection
                .outgoing
                .send(Outgoing {
                    message,
                    done: None,
                })
                .is_ok(),
            _ => false,
        }
    }

    /// Aborts the tasks of `generation`, dropping its socket, and marks the
    /// client disconnected.
    ///
    /// Returns `false` if that connection was already finished or superseded.
    fn finish(&self, generation: u64, reason: DisconnectReason) -> bool {
        let mut connection = self.connection.lock();
        if !self.is_current(generation) || self.phase() == ConnectionPhase::Disconnected {
            return false;
        }
        if let Some(connection) = connection.take() {
            connection.abort();
        }
        *self.last_disconnect.lock() = Some(reason);
        self.phase.send_replace(ConnectionPhase::Disconnected);
        true
    }
}

/// Client for the real-time event feed.
///
/// Cheap to clone; clones share the connection and the registry.
#[derive(Debug, Clone)]
pub struct FeedClient {
    config: FeedConfig,
    sessions: SessionManager,
    registry: Arc<SubscriptionRegistry>,
    shared: Arc<Shared>,
    /// Child of the session whose end will release the registry.
    bound_session: Arc<Mutex<Option<Scope>>>,
}

impl FeedClient {
    /// Creates a disconnected client bound to `sessions`.
    #[must_use]
    pub fn new(
        config: FeedConfig,
        sessions: SessionManager,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            config,
            sessions,
            registry,
            shared: Arc::new(Shared::new()),
            bound_session: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the registry events are fanned out through.
    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Returns the configuration this client dials with.
    #[must_use]
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Arranges for every subscription to be closed when the current
    /// session ends. No-op without a session or when already armed for it.
    ///
    /// Called by [`FeedClient::subscribe`] and [`FeedClient::connect`];
    /// login code calls it too so that teardown never depends on a
    /// connection having been made. Must be called from within a Tokio
    /// runtime.
    pub fn bind_session(&self) {
        let mut bound = self.bound_session.lock();
        // Only one session is live at a time, so a live bound scope is a
        // child of the current session.
        if bound.as_ref().is_some_and(|scope| !scope.is_cancelled()) {
            return;
        }
        let Ok(scope) = self.sessions.derive_scope() else {
            return;
        };
        *bound = Some(scope.clone());

        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            scope.cancelled().await;
            let closed = registry.close_all().await;
            tracing::debug!(closed, "session ended; released feed subscribers");
        });
    }

    /// Subscribes to `category`. See [`SubscriptionRegistry::subscribe`].
    ///
    /// The subscription is closed when the current session ends. Taken
    /// without a session, it lives until the end of the next one.
    pub async fn subscribe(&self, category: EventCategory) -> Subscription {
        self.bind_session();
        self.registry.subscribe(category).await
    }

    /// Unsubscribes `id`. See [`SubscriptionRegistry::unsubscribe`].
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.unsubscribe(id).await
    }

    /// Current connection phase.
    #[must_use]
    pub fn status(&self) -> ConnectionPhase {
        self.shared.phase()
    }

    /// Returns `true` while frames can be sent.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionPhase::Connected
    }

    /// Receiver that observes every phase change.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionPhase> {
        self.shared.phase.subscribe()
    }

    /// Why the most recent connection ended, if one has.
    #[must_use]
    pub fn last_disconnect(&self) -> Option<DisconnectReason> {
        self.shared.last_disconnect.lock().clone()
    }

    /// Completes once the client is in [`ConnectionPhase::Disconnected`].
    pub async fn wait_disconnected(&self) {
        let mut status = self.shared.phase.subscribe();
        wait_for_phase(&mut status, ConnectionPhase::Disconnected).await;
    }

    /// Opens the feed connection for the current session.
    ///
    /// The connection is bound to a child of the session scope: when the
    /// session ends, the connection shuts itself down.
    ///
    /// # Errors
    ///
    /// - [`FeedError::Unauthenticated`] if there is no valid access token.
    /// - [`FeedError::AlreadyConnected`] unless the client is disconnected.
    /// - [`FeedError::Rejected`] if the server refuses the handshake.
    /// - [`FeedError::HandshakeTimeout`] / [`FeedError::Transport`] on
    ///   network failure.
    pub async fn connect(&self) -> Result<(), FeedError> {
        let token = self
            .sessions
            .access_token()
            .ok_or(FeedError::Unauthenticated)?;
        let scope = self.sessions.derive_scope()?;
        let request = self.build_request(&token)?;
        self.bind_session();

        let began = self.shared.phase.send_if_modified(|phase| {
            if *phase == ConnectionPhase::Disconnected {
                *phase = ConnectionPhase::Connecting;
                true
            } else {
                false
            }
        });
        if !began {
            return Err(FeedError::AlreadyConnected);
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let endpoint = self.config.endpoint();
        tracing::debug!(%endpoint, generation, "opening feed connection");

        let handshake = tokio::time::timeout(
            self.config.handshake_timeout,
            tokio_tungstenite::connect_async(request),
        )
        .await;

        let stream = match handshake {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(err)) => {
                self.shared.phase.send_replace(ConnectionPhase::Disconnected);
                let err = FeedError::from(err);
                tracing::error!(%endpoint, error = %err, "feed handshake failed");
                return Err(err);
            }
            Err(_elapsed) => {
                self.shared.phase.send_replace(ConnectionPhase::Disconnected);
                tracing::error!(%endpoint, "feed handshake timed out");
                return Err(FeedError::HandshakeTimeout);
            }
        };

        let (sink, source) = stream.split();
        let (outgoing, queue) = mpsc::unbounded_channel();
        {
            // Tasks that finish early block on this lock until the
            // connection is installed.
            let mut connection = self.shared.connection.lock();
            *self.shared.peer_close.lock() = None;

            let write = tokio::spawn(write_loop(
                Arc::clone(&self.shared),
                sink,
                queue,
                generation,
            ));
            let read = tokio::spawn(read_loop(
                Arc::clone(&self.shared),
                Arc::clone(&self.registry),
                source,
                scope.clone(),
                generation,
            ));
            let keepalive = tokio::spawn(keepalive_loop(
                Arc::clone(&self.shared),
                scope.clone(),
                self.config.keepalive_interval,
                generation,
            ));

            *connection = Some(Connection {
                generation,
                outgoing,
                tasks: vec![
                    read.abort_handle(),
                    write.abort_handle(),
                    keepalive.abort_handle(),
                ],
            });
            self.shared.phase.send_replace(ConnectionPhase::Connected);
        }
        tracing::info!(%endpoint, generation, "feed connected");

        tokio::spawn(shutdown_on_cancel(
            Arc::clone(&self.shared),
            scope,
            self.config.shutdown_timeout,
            generation,
        ));

        Ok(())
    }

    /// Serializes `payload` under `kind` and writes it to the feed.
    ///
    /// Safe to call concurrently with the connection's own tasks. Frames
    /// are written in call order.
    ///
    /// # Errors
    ///
    /// - [`FeedError::NotConnected`] without a session or live connection,
    ///   or if the connection ends before the frame is written.
    /// - [`FeedError::Encode`] if `payload` fails to serialize.
    /// - [`FeedError::Transport`] if the write fails.
    pub async fn send<T: Serialize + ?Sized>(
        &self,
        kind: FeedMessageType,
        payload: &T,
    ) -> Result<(), FeedError> {
        if !self.sessions.has_session() || !self.is_connected() {
            return Err(FeedError::NotConnected);
        }
        let text = envelope::encode(kind, payload)?;
        self.shared.send_frame(Message::text(text)).await
    }

    /// Posts `content` to `channel_id`.
    ///
    /// # Errors
    ///
    /// See [`FeedClient::send`].
    pub async fn send_chat_message(
        &self,
        channel_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<(), FeedError> {
        let request = ChatMessageRequest {
            channel_id: channel_id.into(),
            content: content.into(),
        };
        self.send(FeedMessageType::ChatMessageRequest, &request)
            .await
    }

    /// Tells the server which channel is on screen; `None` clears it.
    ///
    /// # Errors
    ///
    /// See [`FeedClient::send`].
    pub async fn set_active_channel(&self, channel_id: Option<&str>) -> Result<(), FeedError> {
        self.send(
            FeedMessageType::SetActiveChannelRequest,
            &SetActiveChannelRequest::new(channel_id),
        )
        .await
    }

    /// Sends a chat macro for the server to expand.
    ///
    /// # Errors
    ///
    /// See [`FeedClient::send`].
    pub async fn send_macro(&self, request: &MacroRequest) -> Result<(), FeedError> {
        self.send(FeedMessageType::MacroRequest, request).await
    }

    fn build_request(&self, token: &str) -> Result<Request, FeedError> {
        let endpoint = self.config.endpoint();
        let mut request = endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| FeedError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            FeedError::InvalidEndpoint("access token is not a valid header value".to_string())
        })?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        Ok(request)
    }
}

/// Completes once the phase equals `target`.
///
/// Drops the watch guard before returning so callers stay `Send`.
async fn wait_for_phase(status: &mut watch::Receiver<ConnectionPhase>, target: ConnectionPhase) {
    // The sender lives in `Shared`, which every caller keeps alive.
    let _ = status.wait_for(|phase| *phase == target).await;
}

/// Reads frames until the socket ends, dispatching each event in order.
async fn read_loop(
    shared: Arc<Shared>,
    registry: Arc<SubscriptionRegistry>,
    mut source: WsSource,
    scope: Scope,
    generation: u64,
) {
    let reason = loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => {
                if scope.is_cancelled() {
                    continue;
                }
                dispatch(&registry, text.as_str()).await;
            }
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = frame.map_or((NO_STATUS_RECEIVED, String::new()), |f| {
                    (u16::from(f.code), f.reason.as_str().to_owned())
                });
                if is_clean_close(code) {
                    tracing::info!(code, %reason, "feed closed by server");
                } else {
                    tracing::warn!(code, %reason, "feed closed by server with error status");
                }
                *shared.peer_close.lock() = Some((code, reason));
            }
            Some(Ok(Message::Binary(data))) => {
                tracing::trace!(len = data.len(), "ignoring binary feed frame");
            }
            Some(Ok(_)) => {}
            Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed))
            | None => break clean_end_reason(&shared, &scope),
            Some(Err(err)) => {
                tracing::error!(error = %err, "feed read failed");
                break DisconnectReason::Failed(err.to_string());
            }
        }
    };

    if shared.finish(generation, reason) {
        tracing::debug!(generation, "feed read loop finished");
    }
}

fn clean_end_reason(shared: &Shared, scope: &Scope) -> DisconnectReason {
    if scope.is_cancelled() {
        return DisconnectReason::Shutdown { acknowledged: true };
    }
    match shared.peer_close.lock().take() {
        Some((code, reason)) => DisconnectReason::ClosedByPeer { code, reason },
        None => DisconnectReason::Failed("feed stream ended without a close frame".to_string()),
    }
}

/// Decodes one text frame and fans it out; bad frames are logged and skipped.
async fn dispatch(registry: &SubscriptionRegistry, text: &str) {
    match envelope::decode_event(text) {
        Ok(event) => {
            let delivered = registry.publish(&event).await;
            tracing::trace!(category = event.category().as_str(), delivered, "feed event dispatched");
        }
        Err(err) => {
            tracing::warn!(error = %err, "skipping undecodable feed frame");
        }
    }
}

/// Writes queued frames in order until the queue closes or a write fails.
async fn write_loop(
    shared: Arc<Shared>,
    mut sink: WsSink,
    mut queue: mpsc::UnboundedReceiver<Outgoing>,
    generation: u64,
) {
    while let Some(Outgoing { message, done }) = queue.recv().await {
        match sink.send(message).await {
            Ok(()) => {
                if let Some(done) = done {
                    let _ = done.send(Ok(()));
                }
            }
            // The read task reports how the connection ended.
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                if let Some(done) = done {
                    let _ = done.send(Err(FeedError::NotConnected));
                }
                break;
            }
            Err(err) => {
                tracing::error!(generation, error = %err, "feed write failed");
                let reason = DisconnectReason::Failed(err.to_string());
                if let Some(done) = done {
                    let _ = done.send(Err(FeedError::from(err)));
                }
                shared.finish(generation, reason);
                break;
            }
        }
    }
}

/// Queues a ping every `interval` while the connection is up.
async fn keepalive_loop(shared: Arc<Shared>, scope: Scope, interval: Duration, generation: u64) {
    let interval = interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut status = shared.phase.subscribe();

    loop {
        tokio::select! {
            () = scope.cancelled() => break,
            () = async {
                let _ = status.wait_for(|phase| *phase != ConnectionPhase::Connected).await;
            } => break,
            _ = ticker.tick() => {
                if shared.enqueue_for(generation, Message::Ping(Default::default())) {
                    tracing::trace!(generation, "keepalive ping queued");
                } else {
                    break;
                }
            }
        }
    }
}

/// Drives the close handshake once the session scope is cancelled.
///
/// The whole shutdown, including a write stalled behind a peer that stopped
/// reading, is bounded by `timeout`.
async fn shutdown_on_cancel(shared: Arc<Shared>, scope: Scope, timeout: Duration, generation: u64) {
    let mut status = shared.phase.subscribe();

    tokio::select! {
        () = scope.cancelled() => {}
        () = wait_for_phase(&mut status, ConnectionPhase::Disconnected) => return,
    }

    tracing::info!(generation, "session ended; closing feed connection");
    let deadline = Instant::now() + timeout;
    shared.phase.send_if_modified(|phase| {
        if *phase == ConnectionPhase::Connected && shared.is_current(generation) {
            *phase = ConnectionPhase::Closing;
            true
        } else {
            false
        }
    });

    let frame = Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: Utf8Bytes::from_static(CLOSE_REASON),
    }));
    let queued = shared.enqueue_for(generation, frame);
    if !queued {
        tracing::debug!(generation, "could not queue close frame");
    }
    let acknowledged = queued
        && tokio::time::timeout_at(
            deadline,
            wait_for_phase(&mut status, ConnectionPhase::Disconnected),
        )
        .await
        .is_ok();

    if !acknowledged {
        tracing::warn!(generation, ?timeout, "close handshake not acknowledged; dropping feed socket");
    }
    shared.finish(generation, DisconnectReason::Shutdown { acknowledged });
    tracing::info!(generation, acknowledged, "feed connection closed");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::session::UserAuth;

    fn client(sessions: SessionManager) -> FeedClient {
        FeedClient::new(
            FeedConfig::for_host("127.0.0.1:9"),
            sessions,
            Arc::new(SubscriptionRegistry::new()),
        )
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let feed = client(SessionManager::new(Scope::new_root()));
        assert_eq!(feed.status(), ConnectionPhase::Disconnected);
        assert!(!feed.is_connected());
        assert!(feed.last_disconnect().is_none());
    }

    #[tokio::test]
    async fn connect_without_session_is_auth_error() {
        let feed = client(SessionManager::new(Scope::new_root()));
        let result = feed.connect().await;
        assert!(matches!(result, Err(FeedError::Unauthenticated)));
        assert_eq!(feed.status(), ConnectionPhase::Disconnected);
    }

    #[tokio::test]
    async fn send_before_connect_is_not_connected() {
        let sessions = SessionManager::new(Scope::new_root());
        sessions.set_session(UserAuth::with_ttl("tok", Duration::from_secs(60)), || {});
        let feed = client(sessions);

        let result = feed.send_chat_message("c1", "hi").await;
        assert!(matches!(result, Err(FeedError::NotConnected)));
        let result = feed.set_active_channel(None).await;
        assert!(matches!(result, Err(FeedError::NotConnected)));
    }

    #[tokio::test]
    async fn refused_dial_returns_to_disconnected() {
        let sessions = SessionManager::new(Scope::new_root());
        sessions.set_session(UserAuth::with_ttl("tok", Duration::from_secs(60)), || {});
        let feed = client(sessions);

        let Err(err) = feed.connect().await else {
            panic!("nothing listens on the discard port");
        };
        assert!(!err.requires_reauth());
        assert_eq!(feed.status(), ConnectionPhase::Disconnected);
    }

    #[test]
    fn clean_close_codes() {
        assert!(is_clean_close(1000));
        assert!(is_clean_close(1001));
        assert!(!is_clean_close(1011));
        assert!(DisconnectReason::Shutdown { acknowledged: false }.is_clean());
        assert!(!DisconnectReason::Failed("boom".to_string()).is_clean());
    }

    #[test]
    fn bearer_header_is_attached() {
        let feed = client(SessionManager::new(Scope::new_root()));
        let Ok(request) = feed.build_request("abc") else {
            panic!("request should build");
        };
        assert_eq!(
            request.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer abc")
        );
        assert_eq!(request.uri().path(), "/api/brochat/connect");
    }

    #[test]
    fn invalid_token_is_rejected_before_dialing() {
        let feed = client(SessionManager::new(Scope::new_root()));
        assert!(matches!(
            feed.build_request("bad\ntoken"),
            Err(FeedError::InvalidEndpoint(_))
        ));
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn connection_tasks_are_send() {
        let shared = Arc::new(Shared::new());
        let scope = Scope::new_root();
        assert_send(&keepalive_loop(
            Arc::clone(&shared),
            scope.clone(),
            Duration::from_secs(1),
            1,
        ));
        assert_send(&shutdown_on_cancel(
            Arc::clone(&shared),
            scope,
            Duration::from_secs(1),
            1,
        ));
    }

    #[tokio::test]
    async fn unqueued_close_is_not_acknowledged() {
        let shared = Arc::new(Shared::new());
        shared.generation.store(1, Ordering::SeqCst);
        shared.phase.send_replace(ConnectionPhase::Connected);
        let scope = Scope::new_root();
        scope.cancel();

        // No connection is installed, so the close frame cannot be queued.
        shutdown_on_cancel(Arc::clone(&shared), scope, Duration::from_secs(5), 1).await;

        assert_eq!(shared.phase(), ConnectionPhase::Disconnected);
        assert_eq!(
            *shared.last_disconnect.lock(),
            Some(DisconnectReason::Shutdown {
                acknowledged: false
            })
        );
    }

    #[test]
    fn finish_ignores_superseded_generation() {
        let shared = Shared::new();
        shared.generation.store(2, Ordering::SeqCst);
        shared.phase.send_replace(ConnectionPhase::Connected);

        assert!(!shared.finish(1, DisconnectReason::Failed("old".to_string())));
        assert_eq!(shared.phase(), ConnectionPhase::Connected);
        assert!(shared.finish(2, DisconnectReason::Failed("new".to_string())));
        assert_eq!(shared.phase(), ConnectionPhase::Disconnected);
    }
}
