//! Feed layer: wire envelope, subscriber registry, connection manager.
//!
//! The feed endpoint pushes JSON envelopes over a single authenticated
//! WebSocket. [`FeedClient`] owns that socket and routes every decoded
//! [`crate::domain::FeedEvent`] through the [`SubscriptionRegistry`].

pub mod client;
pub mod envelope;
pub mod registry;

pub use client::{ConnectionPhase, DisconnectReason, FeedClient};
pub use envelope::{DecodeError, FeedEnvelope, FeedMessageType, decode_event, encode};
pub use registry::{Subscription, SubscriptionRegistry, TryRecvError};
