//! Session manager: the single owner of the logged-in user's credentials.
//!
//! [`SessionManager`] holds at most one live session. Each session owns a
//! [`Scope`] parented to the process scope, plus a monitor task that
//! cancels the session when the access token expires. All mutation goes
//! through [`SessionManager::set_session`] and
//! [`SessionManager::cancel_session`] under one lock.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::{ChatSession, Scope};
use crate::error::SessionError;

/// Credentials for one authenticated login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuth {
    /// Bearer token presented to the feed and REST endpoints.
    pub access_token: String,
    /// Instant after which the token is no longer valid.
    pub expires_at: DateTime<Utc>,
}

impl UserAuth {
    /// Creates credentials expiring at `expires_at`.
    #[must_use]
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// Creates credentials that expire `ttl` from now.
    ///
    /// A `ttl` too large for the calendar saturates to the far future.
    #[must_use]
    pub fn with_ttl(access_token: impl Into<String>, ttl: Duration) -> Self {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(access_token, expires_at)
    }

    /// Returns `true` if the token is expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    fn time_to_expiry(&self) -> Duration {
        (self.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug)]
struct ActiveSession {
    id: Uuid,
    auth: UserAuth,
    scope: Scope,
}

#[derive(Debug, Default)]
struct SessionState {
    session: Option<ActiveSession>,
    chat: Option<ChatSession>,
}

#[derive(Debug)]
struct SessionInner {
    root: Scope,
    state: Mutex<SessionState>,
}

/// Owner of the current user session and its scope tree.
///
/// Cheap to clone; every clone refers to the same session slot.
#[derive(Debug, Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    /// Creates a manager whose sessions are children of `root`.
    #[must_use]
    pub fn new(root: Scope) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                root,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    /// Returns the process-level scope sessions are parented to.
    #[must_use]
    pub fn root(&self) -> &Scope {
        &self.inner.root
    }

    /// Replaces the current session with a new one for `auth`.
    ///
    /// The previous session (and any chat session inside it) is cancelled
    /// first. A monitor task cancels the new session when the token
    /// expires, invoking `on_expire` just before doing so. `on_expire` is
    /// not called if the session ends for any other reason.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn set_session<F>(&self, auth: UserAuth, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.state.lock();

        if let Some(chat) = state.chat.take() {
            chat.scope().cancel();
        }
        if let Some(previous) = state.session.take() {
            tracing::debug!(session_id = %previous.id, "replacing user session");
            previous.scope.cancel();
        }

        let id = Uuid::new_v4();
        let scope = self.inner.root.new_child();
        let until_expiry = auth.time_to_expiry();

        tokio::spawn(monitor_expiry(
            Arc::downgrade(&self.inner),
            id,
            scope.clone(),
            until_expiry,
            on_expire,
        ));

        tracing::info!(session_id = %id, expires_at = %auth.expires_at, "user session started");
        state.session = Some(ActiveSession { id, auth, scope });
    }

    /// Returns the access token if a session exists and it has not expired.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        let state = self.inner.state.lock();
        let session = state.session.as_ref()?;
        if session.auth.is_expired_at(Utc::now()) {
            return None;
        }
        Some(session.auth.access_token.clone())
    }

    /// Returns the credentials of the current session, expired or not.
    #[must_use]
    pub fn user_auth(&self) -> Option<UserAuth> {
        self.inner
            .state
            .lock()
            .session
            .as_ref()
            .map(|s| s.auth.clone())
    }

    /// Returns `true` while a session is held.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.inner.state.lock().session.is_some()
    }

    /// Cancels and discards the current session. No-op without one.
    pub fn cancel_session(&self) {
        let mut state = self.inner.state.lock();
        Self::teardown(&mut state);
    }

    /// Returns a new scope that ends when the current session ends.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoActiveSession`] if no session is held;
    /// callers are expected to check [`SessionManager::access_token`] first.
    pub fn derive_scope(&self) -> Result<Scope, SessionError> {
        let state = self.inner.state.lock();
        state
            .session
            .as_ref()
            .map(|s| s.scope.new_child())
            .ok_or(SessionError::NoActiveSession)
    }

    /// Opens a chat session for `channel_id`, closing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoActiveSession`] if no session is held.
    pub fn open_chat_session(
        &self,
        channel_id: impl Into<String>,
    ) -> Result<ChatSession, SessionError> {
        let mut state = self.inner.state.lock();
        let scope = state
            .session
            .as_ref()
            .map(|s| s.scope.new_child())
            .ok_or(SessionError::NoActiveSession)?;

        if let Some(previous) = state.chat.take() {
            previous.scope().cancel();
        }

        let chat = ChatSession::new(channel_id.into(), scope);
        tracing::debug!(channel_id = chat.channel_id(), "chat session opened");
        state.chat = Some(chat.clone());
        Ok(chat)
    }

    /// Closes the current chat session. No-op without one.
    pub fn close_chat_session(&self) {
        if let Some(chat) = self.inner.state.lock().chat.take() {
            tracing::debug!(channel_id = chat.channel_id(), "chat session closed");
            chat.scope().cancel();
        }
    }

    /// Returns the open chat session, if any.
    #[must_use]
    pub fn chat_session(&self) -> Option<ChatSession> {
        self.inner.state.lock().chat.clone()
    }

    fn cancel_if_current(&self, id: Uuid) {
        let mut state = self.inner.state.lock();
        if state.session.as_ref().is_some_and(|s| s.id == id) {
            Self::teardown(&mut state);
        }
    }

    fn teardown(state: &mut SessionState) {
        state.chat = None;
        if let Some(session) = state.session.take() {
            tracing::info!(session_id = %session.id, "user session cancelled");
            session.scope.cancel();
        }
    }
}

/// Races the session scope against the token expiry instant.
async fn monitor_expiry<F>(
    inner: Weak<SessionInner>,
    id: Uuid,
    scope: Scope,
    until_expiry: Duration,
    on_expire: F,
) where
    F: FnOnce() + Send + 'static,
{
    tokio::select! {
        () = scope.cancelled() => {
            tracing::trace!(session_id = %id, "expiry monitor stopped");
        }
        () = tokio::time::sleep(until_expiry) => {
            if scope.is_cancelled() {
                return;
            }
            tracing::info!(session_id = %id, "access token expired");
            on_expire();
            if let Some(inner) = inner.upgrade() {
                SessionManager { inner }.cancel_if_current(id);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new(Scope::new_root())
    }

    fn hour() -> Duration {
        Duration::from_secs(3600)
    }

    #[tokio::test]
    async fn no_session_has_no_token() {
        let sessions = manager();
        assert!(sessions.access_token().is_none());
        assert!(!sessions.has_session());
        assert_eq!(sessions.derive_scope().err(), Some(SessionError::NoActiveSession));
    }

    #[tokio::test]
    async fn set_session_exposes_token() {
        let sessions = manager();
        sessions.set_session(UserAuth::with_ttl("tok-1", hour()), || {});
        assert_eq!(sessions.access_token().as_deref(), Some("tok-1"));
        assert!(sessions.has_session());
    }

    #[tokio::test]
    async fn expired_token_is_invalid_immediately() {
        let sessions = manager();
        let past = Utc::now() - chrono::Duration::seconds(5);
        sessions.set_session(UserAuth::new("stale", past), || {});
        assert!(sessions.access_token().is_none());
    }

    #[tokio::test]
    async fn expiry_fires_callback_once_and_cancels() {
        let sessions = manager();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        sessions.set_session(
            UserAuth::with_ttl("short", Duration::from_millis(100)),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        let Ok(scope) = sessions.derive_scope() else {
            panic!("session should be active");
        };
        assert!(sessions.access_token().is_some());

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(sessions.access_token().is_none());
        assert!(!sessions.has_session());
        assert!(scope.is_cancelled());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn replacing_session_cancels_previous_scope() {
        let sessions = manager();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        sessions.set_session(
            UserAuth::with_ttl("first", Duration::from_millis(100)),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        let Ok(first_scope) = sessions.derive_scope() else {
            panic!("session should be active");
        };

        sessions.set_session(UserAuth::with_ttl("second", hour()), || {});
        assert!(first_scope.is_cancelled());
        assert_eq!(sessions.access_token().as_deref(), Some("second"));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(sessions.access_token().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn cancel_session_is_idempotent() {
        let sessions = manager();
        sessions.cancel_session();

        sessions.set_session(UserAuth::with_ttl("tok", hour()), || {});
        let Ok(scope) = sessions.derive_scope() else {
            panic!("session should be active");
        };
        sessions.cancel_session();
        sessions.cancel_session();

        assert!(scope.is_cancelled());
        assert!(sessions.access_token().is_none());
        assert!(!sessions.root().is_cancelled());
    }

    #[tokio::test]
    async fn cancelling_root_ends_session_scope() {
        let root = Scope::new_root();
        let sessions = SessionManager::new(root.clone());
        sessions.set_session(UserAuth::with_ttl("tok", hour()), || {});
        let Ok(scope) = sessions.derive_scope() else {
            panic!("session should be active");
        };
        root.cancel();
        assert!(scope.is_cancelled());
    }

    #[tokio::test]
    async fn chat_session_requires_user_session() {
        let sessions = manager();
        assert_eq!(
            sessions.open_chat_session("c1").err(),
            Some(SessionError::NoActiveSession)
        );
    }

    #[tokio::test]
    async fn closing_chat_leaves_session_alive() {
        let sessions = manager();
        sessions.set_session(UserAuth::with_ttl("tok", hour()), || {});
        let Ok(feed_scope) = sessions.derive_scope() else {
            panic!("session should be active");
        };
        let Ok(chat) = sessions.open_chat_session("c1") else {
            panic!("chat session should open");
        };
        assert_eq!(chat.channel_id(), "c1");

        sessions.close_chat_session();
        sessions.close_chat_session();

        assert!(chat.is_closed());
        assert!(!feed_scope.is_cancelled());
        assert!(sessions.access_token().is_some());
        assert!(sessions.chat_session().is_none());
    }

    #[tokio::test]
    async fn session_cancel_closes_chat() {
        let sessions = manager();
        sessions.set_session(UserAuth::with_ttl("tok", hour()), || {});
        let Ok(chat) = sessions.open_chat_session("c1") else {
            panic!("chat session should open");
        };
        sessions.cancel_session();
        assert!(chat.is_closed());
        assert!(sessions.chat_session().is_none());
    }

    #[tokio::test]
    async fn opening_new_chat_closes_previous() {
        let sessions = manager();
        sessions.set_session(UserAuth::with_ttl("tok", hour()), || {});
        let Ok(first) = sessions.open_chat_session("c1") else {
            panic!("chat session should open");
        };
        let Ok(second) = sessions.open_chat_session("c2") else {
            panic!("chat session should open");
        };
        assert!(first.is_closed());
        assert!(!second.is_closed());
        assert_eq!(
            sessions.chat_session().map(|c| c.channel_id().to_string()),
            Some("c2".to_string())
        );
    }
}
