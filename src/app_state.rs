//! Shared application context handed to every UI screen.

use std::sync::Arc;

use crate::config::FeedConfig;
use crate::feed::{FeedClient, SubscriptionRegistry};
use crate::session::{Scope, SessionManager, UserAuth};

/// The one session manager and the one feed client of the process.
///
/// Screens receive a clone; no screen mutates session state except through
/// [`SessionManager`].
#[derive(Debug, Clone)]
pub struct AppContext {
    /// Owner of the current login and its scopes.
    pub sessions: SessionManager,
    /// Feed connection bound to `sessions`.
    pub feed: FeedClient,
}

impl AppContext {
    /// Wires a session manager under `root` to a fresh feed client.
    #[must_use]
    pub fn new(root: Scope, config: FeedConfig) -> Self {
        let sessions = SessionManager::new(root);
        let feed = FeedClient::new(
            config,
            sessions.clone(),
            Arc::new(SubscriptionRegistry::new()),
        );
        Self { sessions, feed }
    }

    /// Starts a session for `auth`; `on_expire` runs if the token lapses.
    ///
    /// Feed subscriptions are released when this session ends, connected
    /// or not. Must be called from within a Tokio runtime.
    pub fn login<F>(&self, auth: UserAuth, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.sessions.set_session(auth, on_expire);
        self.feed.bind_session();
    }

    /// Ends the session; the feed connection closes itself in response.
    pub fn logout(&self) {
        self.sessions.cancel_session();
    }
}
