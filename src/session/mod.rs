//! Process-wide session state.
//!
//! [`SessionStore`] is the single reactive source of truth for "who is
//! logged in". [`SessionSynchronizer`] is its only writer during normal
//! operation: it bridges MID auth-change pushes into the store and mirrors
//! tokens into a [`TokenStore`] side channel for cross-request reuse.

mod store;
mod sync;
mod tokens;

pub use store::{AuthState, SessionStore, StoreSubscription};
pub use sync::SessionSynchronizer;
pub use tokens::{ACCESS_TOKEN_KEY, MemoryTokenStore, REFRESH_TOKEN_KEY, TokenStore};
