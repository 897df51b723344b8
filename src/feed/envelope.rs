//! Feed wire envelope and type-tag dispatch.
//!
//! Every text frame is `{"type": <int>, "content": <raw JSON>}`. The
//! envelope is parsed first with `content` left as raw JSON; the tag then
//! selects the concrete payload type.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::domain::{ChannelUpdatedEvent, ChatMessage, FeedEvent, UserProfileUpdatedEvent};

/// Type tag carried in every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FeedMessageType {
    /// Server → client chat message.
    ChatMessage = 1,
    /// Client → server chat message.
    ChatMessageRequest = 2,
    /// Client → server active channel change.
    SetActiveChannelRequest = 3,
    /// Server → client profile change notice.
    UserProfileUpdated = 4,
    /// Server → client channel change notice.
    ChannelUpdated = 5,
    /// Client → server macro invocation.
    MacroRequest = 6,
}

impl FeedMessageType {
    /// Returns `true` for tags the client only ever sends.
    #[must_use]
    pub const fn is_outbound(self) -> bool {
        matches!(
            self,
            Self::ChatMessageRequest | Self::SetActiveChannelRequest | Self::MacroRequest
        )
    }
}

impl TryFrom<u8> for FeedMessageType {
    type Error = DecodeError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(Self::ChatMessage),
            2 => Ok(Self::ChatMessageRequest),
            3 => Ok(Self::SetActiveChannelRequest),
            4 => Ok(Self::UserProfileUpdated),
            5 => Ok(Self::ChannelUpdated),
            6 => Ok(Self::MacroRequest),
            other => Err(DecodeError::UnknownType(other)),
        }
    }
}

impl From<FeedMessageType> for u8 {
    fn from(kind: FeedMessageType) -> Self {
        kind as u8
    }
}

/// Reasons a frame could not be turned into a [`FeedEvent`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not a valid envelope.
    #[error("malformed feed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// The envelope carries a tag this client does not know.
    #[error("unknown feed message type {0}")]
    UnknownType(u8),

    /// The server sent a tag that only flows client → server.
    #[error("unexpected outbound-only message type {0:?}")]
    OutboundOnly(FeedMessageType),

    /// The content does not match the payload shape for its tag.
    #[error("malformed {kind:?} payload: {source}")]
    Payload {
        /// Tag the content was decoded as.
        kind: FeedMessageType,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Owned envelope used for outbound frames.
#[derive(Debug, Serialize)]
pub struct FeedEnvelope {
    /// Type tag.
    #[serde(rename = "type")]
    pub kind: FeedMessageType,
    /// Already-serialized payload.
    pub content: Box<RawValue>,
}

impl FeedEnvelope {
    /// Wraps `payload` under `kind`.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if `payload` fails to serialize.
    pub fn new<T: Serialize + ?Sized>(
        kind: FeedMessageType,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind,
            content: serde_json::value::to_raw_value(payload)?,
        })
    }

    /// Serializes the envelope to a text frame body.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if serialization fails.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Deserialize)]
struct RawEnvelope<'a> {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(borrow)]
    content: &'a RawValue,
}

/// Serializes `payload` under `kind` into a text frame body.
///
/// # Errors
///
/// Returns the JSON error if `payload` fails to serialize.
pub fn encode<T: Serialize + ?Sized>(
    kind: FeedMessageType,
    payload: &T,
) -> Result<String, serde_json::Error> {
    FeedEnvelope::new(kind, payload)?.to_text()
}

/// Decodes one text frame into a [`FeedEvent`].
///
/// # Errors
///
/// Returns a [`DecodeError`] describing the first failure; callers log it
/// and move on to the next frame.
pub fn decode_event(text: &str) -> Result<FeedEvent, DecodeError> {
    let envelope: RawEnvelope<'_> = serde_json::from_str(text).map_err(DecodeError::Envelope)?;
    let kind = FeedMessageType::try_from(envelope.kind)?;
    let content = envelope.content.get();

    let decoded = match kind {
        FeedMessageType::ChatMessage => {
            serde_json::from_str::<ChatMessage>(content).map(FeedEvent::from)
        }
        FeedMessageType::UserProfileUpdated => {
            serde_json::from_str::<UserProfileUpdatedEvent>(content).map(FeedEvent::from)
        }
        FeedMessageType::ChannelUpdated => {
            serde_json::from_str::<ChannelUpdatedEvent>(content).map(FeedEvent::from)
        }
        FeedMessageType::ChatMessageRequest
        | FeedMessageType::SetActiveChannelRequest
        | FeedMessageType::MacroRequest => return Err(DecodeError::OutboundOnly(kind)),
    };

    decoded.map_err(|source| DecodeError::Payload { kind, source })
}
