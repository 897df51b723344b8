//! Inbound feed events.
//!
//! The server pushes three kinds of events. Each decodes into an immutable
//! value record; [`FeedEvent`] is the closed union the registry fans out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A text message posted to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message identifier.
    pub id: String,
    /// Channel the message was posted in.
    #[serde(alias = "channelId")]
    pub channel_id: String,
    /// Author of the message.
    #[serde(alias = "senderUserId")]
    pub sender_user_id: String,
    /// Message body.
    pub content: String,
    /// Server receive time.
    #[serde(
        rename = "recieved_at_utc",
        alias = "received_at_utc",
        alias = "receivedAtUtc"
    )]
    pub received_at_utc: DateTime<Utc>,
}

/// Reason code attached to a user-profile update.
///
/// The server defines the code space; unknown codes are preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfileUpdateCode(pub u8);

impl UserProfileUpdateCode {
    /// The user's room membership changed.
    pub const ROOM_UPDATE: Self = Self(1);
}

/// The current user's profile changed on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfileUpdatedEvent {
    /// What changed.
    #[serde(alias = "updateCode")]
    pub update_code: UserProfileUpdateCode,
}

/// A channel's metadata or membership changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelUpdatedEvent {
    /// The channel that changed.
    #[serde(alias = "channelId")]
    pub channel_id: String,
}

/// Category a subscriber registers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// [`ChatMessage`] events.
    ChatMessage,
    /// [`UserProfileUpdatedEvent`] events.
    UserProfileUpdated,
    /// [`ChannelUpdatedEvent`] events.
    ChannelUpdated,
}

impl EventCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 3] = [
        Self::ChatMessage,
        Self::UserProfileUpdated,
        Self::ChannelUpdated,
    ];

    /// Returns a stable lowercase label for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChatMessage => "chat_message",
            Self::UserProfileUpdated => "user_profile_updated",
            Self::ChannelUpdated => "channel_updated",
        }
    }
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// New chat message.
    ChatMessage(ChatMessage),
    /// Profile of the logged-in user changed.
    UserProfileUpdated(UserProfileUpdatedEvent),
    /// A channel changed.
    ChannelUpdated(ChannelUpdatedEvent),
}

impl FeedEvent {
    /// Returns the subscription category this event is delivered under.
    #[must_use]
    pub const fn category(&self) -> EventCategory {
        match self {
            Self::ChatMessage(_) => EventCategory::ChatMessage,
            Self::UserProfileUpdated(_) => EventCategory::UserProfileUpdated,
            Self::ChannelUpdated(_) => EventCategory::ChannelUpdated,
        }
    }
}

impl From<ChatMessage> for FeedEvent {
    fn from(msg: ChatMessage) -> Self {
        Self::ChatMessage(msg)
    }
}

impl From<UserProfileUpdatedEvent> for FeedEvent {
    fn from(event: UserProfileUpdatedEvent) -> Self {
        Self::UserProfileUpdated(event)
    }
}

impl From<ChannelUpdatedEvent> for FeedEvent {
    fn from(event: ChannelUpdatedEvent) -> Self {
        Self::ChannelUpdated(event)
    }
}
