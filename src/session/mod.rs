//! Session layer: credentials, expiry, and the cancellation scope tree.
//!
//! The tree is process scope → session scope → {feed connection, chat
//! room}. Everything that must stop on logout hangs off the session scope.

pub mod chat;
pub mod manager;
pub mod scope;

pub use chat::ChatSession;
pub use manager::{SessionManager, UserAuth};
pub use scope::Scope;
