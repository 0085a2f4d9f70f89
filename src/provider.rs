use std::future::Future;
use std::sync::Arc;

use crate::error::Error;
use crate::types::{AuthChange, Session, User};

/// Callback invoked for every pushed [`AuthChange`].
pub type AuthListener = Arc<dyn Fn(&AuthChange) + Send + Sync>;

/// The narrow surface through which this crate talks to the identity
/// service.
///
/// [`AuthClient`](crate::client::AuthClient) is the production
/// implementation; tests substitute doubles. Everything else in the crate
/// treats the service as opaque and reachable only through these
/// operations.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Authenticate with email and password.
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, Error>> + Send;

    /// Register a new account.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> impl Future<Output = Result<Session, Error>> + Send;

    /// End the current session.
    fn sign_out(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// One-shot fetch of the current session, if any.
    fn get_session(&self) -> impl Future<Output = Result<Option<Session>, Error>> + Send;

    /// Fetch the identity record behind the current access token.
    fn get_user(&self) -> impl Future<Output = Result<Option<User>, Error>> + Send;

    /// Exchange a refresh token for a fresh session.
    fn refresh_session(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<Session, Error>> + Send;

    /// Ask the service to send a password-reset email.
    fn request_password_reset(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Confirm an email address with the 6-digit code sent to it.
    fn verify_email(
        &self,
        email: &str,
        code: &str,
    ) -> impl Future<Output = Result<Session, Error>> + Send;

    /// Register a standing listener for auth-change pushes.
    ///
    /// The listener fires until the returned handle is dropped or
    /// explicitly unsubscribed.
    fn subscribe_auth_changes(&self, listener: AuthListener) -> AuthSubscription;

    /// Build the authorization request that starts an OAuth login.
    #[cfg(feature = "oauth")]
    fn begin_oauth(
        &self,
        provider: crate::types::OAuthProvider,
    ) -> Result<crate::oauth::AuthorizationRequest, Error>;
}

/// Cancellation handle for an auth-change subscription.
///
/// Unsubscribes when dropped, so holding the handle is what keeps the
/// subscription alive. Teardown paths cannot leak a listener.
pub struct AuthSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl AuthSubscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Cancel the subscription now. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for AuthSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSubscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
