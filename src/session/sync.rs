use std::sync::Arc;

use crate::provider::{AuthSubscription, IdentityProvider};
use crate::session::store::SessionStore;
use crate::session::tokens::{TokenStore, mirror_session};

/// Bridge between the identity service's push notifications and the
/// [`SessionStore`].
///
/// Attaching performs the one bootstrap fetch and registers the standing
/// auth-change subscription. Attach exactly one synchronizer per store: the
/// bootstrap is what resolves the store's `is_loading` flag, and it must
/// resolve once.
pub struct SessionSynchronizer {
    subscription: AuthSubscription,
}

impl SessionSynchronizer {
    /// Wire `store` (and the token side channel) to `provider`.
    ///
    /// The subscription is registered before the bootstrap fetch so no push
    /// is missed. Bootstrap and pushes may resolve in either order; the
    /// last write wins. A failed bootstrap reads as "no session": the store
    /// still leaves the loading state, exactly once.
    ///
    /// Tokens are mirrored before the store mutation becomes observable, so
    /// any subscriber that sees `is_authenticated == true` can already read
    /// the persisted tokens.
    pub async fn attach<P, T>(provider: &P, store: &SessionStore, tokens: &T) -> Self
    where
        P: IdentityProvider,
        T: TokenStore + Clone,
    {
        let subscription = provider.subscribe_auth_changes({
            let store = store.clone();
            let tokens = tokens.clone();
            Arc::new(move |change| {
                let session = change.session().cloned();
                tracing::debug!(change = ?change, "applying auth change");
                mirror_session(&tokens, session.as_ref());
                store.set_session(session);
            })
        });

        let session = match provider.get_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "session bootstrap fetch failed");
                None
            }
        };
        mirror_session(tokens, session.as_ref());
        store.set_session(session);
        store.set_loading(false);

        Self { subscription }
    }

    /// Cancel the standing subscription.
    ///
    /// Call before discarding the store so no listener keeps mutating it.
    /// Dropping the synchronizer has the same effect.
    pub fn detach(self) {
        self.subscription.unsubscribe();
    }
}
