use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::types::Session;

/// Side-channel key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "__mid_access";
/// Side-channel key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "__mid_refresh";

/// Durable cross-request token storage (a cookie jar in browser hosts).
///
/// Implementations must be safe to call in hosts without such a facility;
/// a no-op implementation satisfies the contract there.
pub trait TokenStore: Send + Sync + 'static {
    fn set(&self, key: &str, value: &str);
    fn get(&self, key: &str) -> Option<String>;
    fn remove(&self, key: &str);
}

/// In-memory [`TokenStore`] for native hosts and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryTokenStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl TokenStore for MemoryTokenStore {
    fn set(&self, key: &str, value: &str) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
    }

    fn get(&self, key: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn remove(&self, key: &str) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Mirror `session` into the side channel: both tokens written when a
/// session is present, both entries removed when it is absent.
pub(crate) fn mirror_session<T: TokenStore + ?Sized>(tokens: &T, session: Option<&Session>) {
    match session {
        Some(session) => {
            tokens.set(ACCESS_TOKEN_KEY, &session.access_token);
            tokens.set(REFRESH_TOKEN_KEY, &session.refresh_token);
        }
        None => {
            tokens.remove(ACCESS_TOKEN_KEY);
            tokens.remove(REFRESH_TOKEN_KEY);
        }
    }
}
