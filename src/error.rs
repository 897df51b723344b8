//! Feed error types with a coarse error taxonomy.
//!
//! [`FeedError`] is the central error type for the feed subsystem. Each
//! variant maps to an [`ErrorKind`] so the UI layer can decide whether the
//! user must re-authenticate, whether the connection is gone, or whether it
//! called the API out of order.

use tokio_tungstenite::tungstenite;

/// Coarse classification of a [`FeedError`].
///
/// | Kind        | Meaning                                       | Caller action            |
/// |-------------|-----------------------------------------------|--------------------------|
/// | `Auth`      | No valid token, or the server refused it      | Re-authenticate          |
/// | `Transport` | Read/write/handshake failure on the socket    | Reconnect (caller-driven)|
/// | `Usage`     | API called in the wrong connection state      | Fix the call site        |
/// | `Decode`    | A payload could not be (de)serialized         | Log and move on          |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Authentication is missing, expired or rejected.
    Auth,
    /// The transport failed.
    Transport,
    /// The operation is not valid in the current state.
    Usage,
    /// Serialization or deserialization failed.
    Decode,
}

/// Errors raised by the session manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// An operation that requires a live session was called without one.
    #[error("no active user session")]
    NoActiveSession,
}

/// Errors raised by the feed client.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// No valid access token is available for the feed connection.
    #[error("no valid authentication information available for feed connection")]
    Unauthenticated,

    /// The server refused the connection handshake.
    #[error("feed handshake rejected with HTTP status {status}")]
    Rejected {
        /// HTTP status code returned by the server.
        status: u16,
    },

    /// `connect` was called while a connection is live or still closing.
    #[error("feed client is already connected")]
    AlreadyConnected,

    /// `send` was called without a live connection or session.
    #[error("feed connection is not established")]
    NotConnected,

    /// The handshake did not finish within the configured timeout.
    #[error("feed handshake timed out")]
    HandshakeTimeout,

    /// The configured endpoint or credentials cannot form a valid request.
    #[error("invalid feed endpoint: {0}")]
    InvalidEndpoint(String),

    /// Read or write failure on the WebSocket.
    #[error("feed transport error: {0}")]
    Transport(#[from] Box<tungstenite::Error>),

    /// Outbound payload serialization failed.
    #[error("failed to encode feed message: {0}")]
    Encode(#[from] serde_json::Error),

    /// Session precondition violated.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl FeedError {
    /// Returns the taxonomy bucket for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated | Self::Rejected { .. } | Self::Session(_) => ErrorKind::Auth,
            Self::Transport(_) | Self::HandshakeTimeout => ErrorKind::Transport,
            Self::AlreadyConnected | Self::NotConnected | Self::InvalidEndpoint(_) => {
                ErrorKind::Usage
            }
            Self::Encode(_) => ErrorKind::Decode,
        }
    }

    /// Returns `true` if the user must log in again before retrying.
    #[must_use]
    pub const fn requires_reauth(&self) -> bool {
        matches!(self.kind(), ErrorKind::Auth)
    }
}

impl From<tungstenite::Error> for FeedError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Http(response) => Self::Rejected {
                status: response.status().as_u16(),
            },
            other => Self::Transport(Box::new(other)),
        }
    }
}
