use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::types::{Session, User};

/// Snapshot of the authentication state.
///
/// `is_authenticated` always equals `session.is_some()`, and `user` always
/// mirrors the session's user. Both are derived inside
/// [`SessionStore::set_session`]; there is no way to observe a half-updated
/// tuple.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct AuthState {
    pub user: Option<User>,
    pub session: Option<Session>,
    pub is_authenticated: bool,
    /// True only during the initial bootstrap fetch.
    pub is_loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            session: None,
            is_authenticated: false,
            is_loading: true,
        }
    }
}

type StateListener = Arc<dyn Fn(&AuthState) + Send + Sync>;

struct StoreInner {
    state: AuthState,
    listeners: Vec<(u64, StateListener)>,
    next_listener_id: u64,
}

/// Reactive, process-wide container for the current [`AuthState`].
///
/// Many consumers read it; the [`SessionSynchronizer`] (and explicit
/// logout) write it. Every mutation notifies all subscribers synchronously,
/// in mutation order. Cloning the store clones the handle, not the state.
///
/// Listeners observe; they should not synchronously trigger new mutations.
///
/// [`SessionSynchronizer`]: crate::session::SessionSynchronizer
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl SessionStore {
    /// Create a store in the logged-out, still-loading state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                state: AuthState::default(),
                listeners: Vec::new(),
                next_listener_id: 0,
            })),
        }
    }

    /// Current state. Never blocks on I/O.
    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
            .clone()
    }

    /// Register `listener` to run after every mutation.
    ///
    /// The listener fires until the returned handle is dropped or
    /// explicitly unsubscribed.
    #[must_use]
    pub fn subscribe(
        &self,
        listener: impl Fn(&AuthState) + Send + Sync + 'static,
    ) -> StoreSubscription {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;
        inner.listeners.push((id, Arc::new(listener)));
        StoreSubscription {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Replace the session, deriving `user` and `is_authenticated` from it.
    ///
    /// Last write wins; the whole tuple is replaced at once.
    pub fn set_session(&self, session: Option<Session>) {
        self.apply(move |state| {
            state.user = session.as_ref().map(|s| s.user.clone());
            state.is_authenticated = session.is_some();
            state.session = session;
        });
    }

    pub fn set_loading(&self, is_loading: bool) {
        self.apply(move |state| state.is_loading = is_loading);
    }

    /// Reset to the fully logged-out state, `is_loading` included.
    pub fn clear(&self) {
        self.apply(|state| {
            *state = AuthState {
                user: None,
                session: None,
                is_authenticated: false,
                is_loading: false,
            };
        });
    }

    fn apply(&self, mutate: impl FnOnce(&mut AuthState)) {
        // Mutate under the lock, then notify with the lock released so a
        // listener reading the store cannot deadlock.
        let (snapshot, listeners) = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            mutate(&mut inner.state);
            let listeners: Vec<StateListener> = inner
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();
            (inner.state.clone(), listeners)
        };
        for listener in listeners {
            listener(&snapshot);
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation handle for a store subscription. Unsubscribes when dropped.
pub struct StoreSubscription {
    inner: Weak<Mutex<StoreInner>>,
    id: u64,
}

impl StoreSubscription {
    /// Stop receiving updates now. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for StoreSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listeners
                .retain(|(id, _)| *id != self.id);
        }
    }
}
