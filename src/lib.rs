#![doc = include_str!("../README.md")]

pub mod auth;
pub mod client;
pub mod error;
pub mod message;
#[cfg(feature = "oauth")]
pub mod oauth;
pub mod provider;
pub mod ratelimit;
pub mod session;
pub mod types;
pub mod validate;

// Re-exports for convenient access
pub use auth::{Auth, AuthFailure};
pub use client::{AuthClient, ClientCell, ClientConfig};
pub use error::Error;
pub use message::{AuthMessage, PasswordResetOutcome, normalize, normalize_message};
#[cfg(feature = "oauth")]
pub use oauth::AuthorizationRequest;
pub use provider::{AuthListener, AuthSubscription, IdentityProvider};
pub use ratelimit::{
    AttemptStore, Clock, ManualClock, MemoryStore, RateLimitStatus, RateLimiter, SystemClock,
};
pub use session::{
    ACCESS_TOKEN_KEY, AuthState, MemoryTokenStore, REFRESH_TOKEN_KEY, SessionStore,
    SessionSynchronizer, StoreSubscription, TokenStore,
};
pub use types::{AuthChange, OAuthProvider, Session, User, UserId};
pub use validate::{is_strong_password, is_valid_email};
