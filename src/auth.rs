use std::sync::Arc;

use time::Duration;

use crate::message::{AuthMessage, PasswordResetOutcome, normalize, password_reset_outcome};
use crate::provider::IdentityProvider;
use crate::ratelimit::{AttemptStore, Clock, RateLimiter, SystemClock};
use crate::types::Session;
use crate::validate;

const LOGIN_ACTION: &str = "login";
const SIGNUP_ACTION: &str = "signup";

const DEFAULT_MAX_ATTEMPTS: usize = 5;
const DEFAULT_WINDOW: Duration = Duration::minutes(15);

/// Why a facade operation did not produce a session.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AuthFailure {
    /// The attempt limit for this action is exhausted. Not a service
    /// error: the request never left the client.
    #[error("Too many attempts. Try again in {} minute(s).", ceil_minutes(.retry_after))]
    RateLimited { retry_after: Duration },
    /// The service rejected the operation. Already normalized; safe to
    /// show as-is.
    #[error("{0}")]
    Rejected(AuthMessage),
}

fn ceil_minutes(duration: &Duration) -> i64 {
    ((duration.whole_seconds() + 59) / 60).max(1)
}

/// The operation surface UI code calls.
///
/// Wraps the provider handle, gates `login`/`signup` behind the attempt
/// limiter, and normalizes every rejection before it can reach a user.
pub struct Auth<P, S, C = SystemClock> {
    provider: Arc<P>,
    limiter: RateLimiter<S, C>,
    max_attempts: usize,
    window: Duration,
}

impl<P, S, C> Auth<P, S, C>
where
    P: IdentityProvider,
    S: AttemptStore,
    C: Clock,
{
    /// Create a facade with the default limits (5 attempts per 15 minutes).
    #[must_use]
    pub fn new(provider: Arc<P>, limiter: RateLimiter<S, C>) -> Self {
        Self {
            provider,
            limiter,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            window: DEFAULT_WINDOW,
        }
    }

    /// Override the attempt limits applied to `login` and `signup`.
    #[must_use]
    pub fn with_limits(mut self, max_attempts: usize, window: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.window = window;
        self
    }

    /// Authenticate with email and password.
    ///
    /// # Errors
    ///
    /// [`AuthFailure::RateLimited`] when the attempt window is full (the
    /// provider is not called, and the blocked attempt does not count);
    /// [`AuthFailure::Rejected`] when the provider refuses. A successful
    /// login clears the attempt history; a failed one does not.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthFailure> {
        let gate = self.limiter.check(LOGIN_ACTION, self.max_attempts, self.window);
        if !gate.allowed {
            tracing::warn!(
                action = LOGIN_ACTION,
                retry_after_s = gate.retry_after.whole_seconds(),
                "attempt limit reached"
            );
            return Err(AuthFailure::RateLimited {
                retry_after: gate.retry_after,
            });
        }
        match self.provider.sign_in_with_password(email, password).await {
            Ok(session) => {
                self.limiter.reset(LOGIN_ACTION);
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "sign-in failed");
                Err(AuthFailure::Rejected(normalize(&e)))
            }
        }
    }

    /// Register a new account.
    ///
    /// Validates the email shape and password policy locally first; local
    /// rejections do not consume an attempt.
    ///
    /// # Errors
    ///
    /// Same surface as [`login`](Auth::login).
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Session, AuthFailure> {
        if !validate::is_valid_email(email) {
            return Err(AuthFailure::Rejected(AuthMessage::InvalidEmail));
        }
        if !validate::is_strong_password(password) {
            return Err(AuthFailure::Rejected(AuthMessage::WeakPassword));
        }

        let gate = self.limiter.check(SIGNUP_ACTION, self.max_attempts, self.window);
        if !gate.allowed {
            tracing::warn!(
                action = SIGNUP_ACTION,
                retry_after_s = gate.retry_after.whole_seconds(),
                "attempt limit reached"
            );
            return Err(AuthFailure::RateLimited {
                retry_after: gate.retry_after,
            });
        }
        match self.provider.sign_up(email, password, name).await {
            Ok(session) => {
                self.limiter.reset(SIGNUP_ACTION);
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "signup failed");
                Err(AuthFailure::Rejected(normalize(&e)))
            }
        }
    }

    /// End the current session.
    ///
    /// # Errors
    ///
    /// [`AuthFailure::Rejected`] when the provider refuses.
    pub async fn logout(&self) -> Result<(), AuthFailure> {
        self.provider.sign_out().await.map_err(|e| {
            tracing::warn!(error = %e, "sign-out failed");
            AuthFailure::Rejected(normalize(&e))
        })
    }

    /// Start an OAuth login with an external provider.
    ///
    /// Returns the authorization request the host navigates to; the
    /// session arrives through
    /// [`AuthClient::complete_oauth`](crate::client::AuthClient::complete_oauth)
    /// once the callback fires. Not attempt-limited: the external provider
    /// holds the credentials.
    ///
    /// # Errors
    ///
    /// [`AuthFailure::Rejected`] when the request cannot be built.
    #[cfg(feature = "oauth")]
    pub async fn login_with_oauth(
        &self,
        provider: crate::types::OAuthProvider,
    ) -> Result<crate::oauth::AuthorizationRequest, AuthFailure> {
        self.provider.begin_oauth(provider).map_err(|e| {
            tracing::warn!(error = %e, "oauth login failed to start");
            AuthFailure::Rejected(normalize(&e))
        })
    }

    /// Ask MID to send a password-reset email.
    ///
    /// Infallible by design: rejections such as unknown-address read as
    /// [`PasswordResetOutcome::EmailSent`], because distinguishing them
    /// would reveal which addresses have accounts. Only transport failures
    /// surface.
    pub async fn request_password_reset(&self, email: &str) -> PasswordResetOutcome {
        match self.provider.request_password_reset(email).await {
            Ok(()) => PasswordResetOutcome::EmailSent,
            Err(e) => {
                tracing::debug!(error = %e, "password reset request failed");
                password_reset_outcome(&e)
            }
        }
    }

    /// Confirm an email address with the 6-digit code sent to it.
    ///
    /// # Errors
    ///
    /// [`AuthFailure::Rejected`] when the code is wrong or expired.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<Session, AuthFailure> {
        match self.provider.verify_email(email, code).await {
            Ok(session) => Ok(session),
            Err(e) => {
                tracing::warn!(error = %e, "email verification failed");
                Err(AuthFailure::Rejected(normalize(&e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ulid::Ulid;

    use super::*;
    use crate::error::Error;
    use crate::provider::{AuthListener, AuthSubscription};
    use crate::ratelimit::{ManualClock, MemoryStore};
    use crate::types::{Session, User, UserId};

    fn session() -> Session {
        Session::new("at", "rt", User::new(UserId(Ulid::nil())))
    }

    fn invalid_credentials() -> Error {
        Error::Provider {
            operation: "sign-in",
            status: Some(401),
            code: Some("INVALID_CREDENTIALS".into()),
            message: "invalid credentials".into(),
        }
    }

    /// Provider double with scripted results and call counting.
    #[derive(Default)]
    struct StubProvider {
        sign_in_calls: AtomicUsize,
        sign_in_results: Mutex<VecDeque<Result<Session, Error>>>,
        sign_up_results: Mutex<VecDeque<Result<Session, Error>>>,
        sign_out_result: Mutex<Option<Result<(), Error>>>,
        reset_result: Mutex<Option<Result<(), Error>>>,
        verify_result: Mutex<Option<Result<Session, Error>>>,
    }

    impl StubProvider {
        fn queue_sign_in(&self, result: Result<Session, Error>) {
            self.sign_in_results.lock().unwrap().push_back(result);
        }

        fn sign_in_calls(&self) -> usize {
            self.sign_in_calls.load(Ordering::SeqCst)
        }
    }

    impl IdentityProvider for StubProvider {
        async fn sign_in_with_password(&self, _: &str, _: &str) -> Result<Session, Error> {
            self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
            self.sign_in_results
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted sign-in result")
        }

        async fn sign_up(&self, _: &str, _: &str, _: &str) -> Result<Session, Error> {
            self.sign_up_results
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted signup result")
        }

        async fn sign_out(&self) -> Result<(), Error> {
            self.sign_out_result
                .lock()
                .unwrap()
                .take()
                .expect("scripted sign-out result")
        }

        async fn get_session(&self) -> Result<Option<Session>, Error> {
            unimplemented!()
        }

        async fn get_user(&self) -> Result<Option<User>, Error> {
            unimplemented!()
        }

        async fn refresh_session(&self, _: &str) -> Result<Session, Error> {
            unimplemented!()
        }

        async fn request_password_reset(&self, _: &str) -> Result<(), Error> {
            self.reset_result
                .lock()
                .unwrap()
                .take()
                .expect("scripted reset result")
        }

        async fn verify_email(&self, _: &str, _: &str) -> Result<Session, Error> {
            self.verify_result
                .lock()
                .unwrap()
                .take()
                .expect("scripted verify result")
        }

        fn subscribe_auth_changes(&self, _: AuthListener) -> AuthSubscription {
            AuthSubscription::new(|| {})
        }

        #[cfg(feature = "oauth")]
        fn begin_oauth(
            &self,
            _: crate::types::OAuthProvider,
        ) -> Result<crate::oauth::AuthorizationRequest, Error> {
            unimplemented!()
        }
    }

    fn auth(provider: Arc<StubProvider>) -> Auth<StubProvider, MemoryStore, ManualClock> {
        let limiter =
            RateLimiter::with_clock(MemoryStore::default(), ManualClock::new(1_700_000_000_000));
        Auth::new(provider, limiter)
    }

    #[tokio::test]
    async fn sixth_login_attempt_is_blocked_before_the_provider() {
        let provider = Arc::new(StubProvider::default());
        let auth = auth(Arc::clone(&provider));

        for _ in 0..5 {
            provider.queue_sign_in(Err(invalid_credentials()));
            let failure = auth.login("a@b.com", "wrong").await.unwrap_err();
            assert!(matches!(
                failure,
                AuthFailure::Rejected(AuthMessage::InvalidCredentials)
            ));
        }
        assert_eq!(provider.sign_in_calls(), 5);

        let failure = auth.login("a@b.com", "wrong").await.unwrap_err();
        assert_eq!(provider.sign_in_calls(), 5, "blocked attempt must not reach MID");
        let AuthFailure::RateLimited { retry_after } = failure else {
            panic!("expected a rate-limit failure");
        };
        assert_eq!(retry_after, Duration::minutes(15));
        assert_eq!(
            AuthFailure::RateLimited { retry_after }.to_string(),
            "Too many attempts. Try again in 15 minute(s)."
        );
    }

    #[tokio::test]
    async fn successful_login_resets_the_attempt_window() {
        let provider = Arc::new(StubProvider::default());
        let auth = auth(Arc::clone(&provider)).with_limits(2, Duration::minutes(15));

        provider.queue_sign_in(Err(invalid_credentials()));
        let _ = auth.login("a@b.com", "wrong").await;
        provider.queue_sign_in(Ok(session()));
        auth.login("a@b.com", "right").await.unwrap();

        // Window cleared: two more attempts are available.
        provider.queue_sign_in(Err(invalid_credentials()));
        let _ = auth.login("a@b.com", "wrong").await;
        provider.queue_sign_in(Err(invalid_credentials()));
        let failure = auth.login("a@b.com", "wrong").await.unwrap_err();
        assert!(matches!(failure, AuthFailure::Rejected(_)));
        assert_eq!(provider.sign_in_calls(), 4);
    }

    #[tokio::test]
    async fn failed_login_surfaces_the_normalized_message_only() {
        let provider = Arc::new(StubProvider::default());
        let auth = auth(Arc::clone(&provider));

        provider.queue_sign_in(Err(Error::Provider {
            operation: "sign-in",
            status: Some(404),
            code: None,
            message: "user a@b.com not found in tenant 42".into(),
        }));
        let failure = auth.login("a@b.com", "pw").await.unwrap_err();
        assert_eq!(
            failure.to_string(),
            AuthMessage::InvalidCredentials.user_text(),
            "raw provider text must never surface"
        );
    }

    #[tokio::test]
    async fn signup_rejects_bad_inputs_without_spending_attempts() {
        let provider = Arc::new(StubProvider::default());
        let auth = auth(Arc::clone(&provider)).with_limits(1, Duration::minutes(15));

        let failure = auth.signup("not-an-email", "Aa1!aaaa", "Ana").await.unwrap_err();
        assert!(matches!(
            failure,
            AuthFailure::Rejected(AuthMessage::InvalidEmail)
        ));
        let failure = auth.signup("ana@example.com", "weak", "Ana").await.unwrap_err();
        assert!(matches!(
            failure,
            AuthFailure::Rejected(AuthMessage::WeakPassword)
        ));

        // The single allowed attempt is still available.
        *provider.sign_up_results.lock().unwrap() = VecDeque::from([Ok(session())]);
        auth.signup("ana@example.com", "Aa1!aaaa", "Ana").await.unwrap();
    }

    #[tokio::test]
    async fn logout_normalizes_provider_failures() {
        let provider = Arc::new(StubProvider::default());
        let auth = auth(Arc::clone(&provider));

        *provider.sign_out_result.lock().unwrap() = Some(Err(Error::Provider {
            operation: "sign-out",
            status: Some(503),
            code: None,
            message: "service unavailable".into(),
        }));
        let failure = auth.logout().await.unwrap_err();
        assert!(matches!(
            failure,
            AuthFailure::Rejected(AuthMessage::ServerUnavailable)
        ));
    }

    #[tokio::test]
    async fn password_reset_reads_as_sent_unless_transport_failed() {
        let provider = Arc::new(StubProvider::default());
        let auth = auth(Arc::clone(&provider));

        *provider.reset_result.lock().unwrap() = Some(Err(Error::Provider {
            operation: "password reset request",
            status: Some(404),
            code: Some("EMAIL_NOT_FOUND".into()),
            message: "no account for this address".into(),
        }));
        assert_eq!(
            auth.request_password_reset("ghost@example.com").await,
            PasswordResetOutcome::EmailSent
        );

        *provider.reset_result.lock().unwrap() = Some(Err(Error::Provider {
            operation: "password reset request",
            status: None,
            code: Some("NETWORK_ERROR".into()),
            message: "network unreachable".into(),
        }));
        assert_eq!(
            auth.request_password_reset("ana@example.com").await,
            PasswordResetOutcome::Failed(AuthMessage::NetworkError)
        );
    }

    #[tokio::test]
    async fn verify_email_maps_code_failures() {
        let provider = Arc::new(StubProvider::default());
        let auth = auth(Arc::clone(&provider));

        *provider.verify_result.lock().unwrap() = Some(Err(Error::Provider {
            operation: "email verification",
            status: Some(400),
            code: Some("CODE_EXPIRED".into()),
            message: "code expired".into(),
        }));
        let failure = auth.verify_email("ana@example.com", "123456").await.unwrap_err();
        assert!(matches!(
            failure,
            AuthFailure::Rejected(AuthMessage::CodeExpired)
        ));
    }

    #[test]
    fn retry_message_rounds_minutes_up() {
        let failure = AuthFailure::RateLimited {
            retry_after: Duration::seconds(61),
        };
        assert_eq!(
            failure.to_string(),
            "Too many attempts. Try again in 2 minute(s)."
        );
        let failure = AuthFailure::RateLimited {
            retry_after: Duration::milliseconds(1),
        };
        assert_eq!(
            failure.to_string(),
            "Too many attempts. Try again in 1 minute(s)."
        );
    }
}
