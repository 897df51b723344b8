//! Domain layer: feed event payloads, outbound requests, identifiers.
//!
//! All types here are plain values. Decoding from the wire lives in
//! [`crate::feed::envelope`].

pub mod feed_event;
pub mod outbound;
pub mod subscription_id;

pub use feed_event::{
    ChannelUpdatedEvent, ChatMessage, EventCategory, FeedEvent, UserProfileUpdateCode,
    UserProfileUpdatedEvent,
};
pub use outbound::{ChatMessageRequest, MacroRequest, NO_ACTIVE_CHANNEL, SetActiveChannelRequest};
pub use subscription_id::SubscriptionId;
