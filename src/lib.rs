//! # broterm-feed
//!
//! Real-time event feed client for the broterm terminal chat application.
//!
//! This crate keeps one authenticated WebSocket to the chat server alive for
//! the lifetime of a login, decodes the server's tagged event envelopes and
//! fans each event out to any number of interested UI screens. Everything
//! is torn down when the login session ends.
//!
//! ## Architecture
//!
//! ```text
//! UI screens (subscribe / unsubscribe / send)
//!     │
//!     ├── AppContext (app_state)
//!     │
//!     ├── FeedClient (feed/client)  ── read / keepalive / shutdown tasks
//!     ├── SubscriptionRegistry (feed/registry)
//!     ├── Envelope decoder (feed/envelope)
//!     │
//!     └── SessionManager + Scope tree (session/)
//! ```

pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod feed;
pub mod session;
