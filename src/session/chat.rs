//! Nested chat-room session.

use super::Scope;

/// An open chat room bound to the user session.
///
/// The scope is a child of the session scope: it dies with the session, but
/// leaving the room cancels only this scope.
#[derive(Debug, Clone)]
pub struct ChatSession {
    channel_id: String,
    scope: Scope,
}

impl ChatSession {
    pub(crate) fn new(channel_id: String, scope: Scope) -> Self {
        Self { channel_id, scope }
    }

    /// Identifier of the open channel.
    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// The room's cancellation scope.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Returns `true` once the room (or the session around it) is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.scope.is_cancelled()
    }
}
