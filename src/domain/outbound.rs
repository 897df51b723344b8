//! Outbound request payloads the client writes to the feed.

use serde::{Deserialize, Serialize};

/// Channel id the server reads as "no channel is active".
pub const NO_ACTIVE_CHANNEL: &str = "NONE";

/// Posts a message to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageRequest {
    /// Target channel.
    pub channel_id: String,
    /// Message body.
    pub content: String,
}

/// Tells the server which channel the user is looking at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetActiveChannelRequest {
    /// The active channel, or [`NO_ACTIVE_CHANNEL`].
    pub channel_id: String,
}

impl SetActiveChannelRequest {
    /// Builds a request; `None` clears the active channel.
    #[must_use]
    pub fn new(channel_id: Option<&str>) -> Self {
        Self {
            channel_id: channel_id.unwrap_or(NO_ACTIVE_CHANNEL).to_string(),
        }
    }
}

/// Asks the server to expand a chat macro (e.g. `/roll`) in a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroRequest {
    /// Server-defined macro kind.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Raw text the user typed.
    pub body: String,
    /// Channel the macro runs in.
    pub channel_id: String,
}
