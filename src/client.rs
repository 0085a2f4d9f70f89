use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use url::Url;

use crate::error::Error;
use crate::provider::{AuthListener, AuthSubscription, IdentityProvider};
use crate::types::{AuthChange, Session, User};

/// MID client configuration.
///
/// Construction is fail-fast: an empty endpoint, an empty API key, or an
/// unparseable endpoint URL is a [`Error::Config`]. There is no fallback
/// endpoint; a client is never built against a guessed backend.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) endpoint: Url,
    pub(crate) api_key: String,
    pub(crate) redirect_uri: Option<Url>,
}

impl ClientConfig {
    /// Create a configuration from an endpoint URL and an API key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either input is empty or the endpoint
    /// is not a valid URL.
    pub fn new(endpoint: &str, api_key: impl Into<String>) -> Result<Self, Error> {
        if endpoint.trim().is_empty() {
            return Err(Error::Config("MID endpoint is required".into()));
        }
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("MID API key is required".into()));
        }
        let mut endpoint: Url = endpoint
            .parse()
            .map_err(|e| Error::Config(format!("MID endpoint: {e}")))?;
        // Relative API paths join against the endpoint, which requires a
        // trailing slash.
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        Ok(Self {
            endpoint,
            api_key,
            redirect_uri: None,
        })
    }

    /// Create a configuration from environment variables.
    ///
    /// # Required env vars
    /// - `MID_ENDPOINT`: MID API base URL
    /// - `MID_API_KEY`: publishable API key
    ///
    /// # Optional env vars
    /// - `MID_REDIRECT_URI`: OAuth callback URI
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or a
    /// URL is invalid. Missing configuration is never papered over with a
    /// default.
    pub fn from_env() -> Result<Self, Error> {
        let endpoint = std::env::var("MID_ENDPOINT")
            .map_err(|_| Error::Config("MID_ENDPOINT is required".into()))?;
        let api_key = std::env::var("MID_API_KEY")
            .map_err(|_| Error::Config("MID_API_KEY is required".into()))?;
        let mut config = Self::new(&endpoint, api_key)?;

        if let Ok(uri) = std::env::var("MID_REDIRECT_URI") {
            let uri: Url = uri
                .parse()
                .map_err(|e| Error::Config(format!("MID_REDIRECT_URI: {e}")))?;
            config = config.with_redirect_uri(uri);
        }
        Ok(config)
    }

    /// Set the OAuth callback URI. Required for [`begin_oauth`].
    ///
    /// [`begin_oauth`]: crate::provider::IdentityProvider::begin_oauth
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: Url) -> Self {
        self.redirect_uri = Some(uri);
        self
    }

    /// MID API base URL (normalized with a trailing slash).
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Handle to the MID API.
///
/// Owns the HTTP connection pool, the last session it issued, and the
/// auth-change listener registry. Create one per process through
/// [`ClientCell`].
pub struct AuthClient {
    config: ClientConfig,
    http: reqwest::Client,
    current: Mutex<Option<Session>>,
    hub: ListenerHub,
}

impl AuthClient {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            current: Mutex::new(None),
            hub: ListenerHub::default(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn api_url(&self, path: &str) -> Url {
        self.config
            .endpoint
            .join(path)
            .expect("relative API path is valid")
    }

    fn current_session(&self) -> Option<Session> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record `session` as current and notify listeners. The session is
    /// installed before any listener runs.
    pub(crate) fn install_session(&self, session: Session, refreshed: bool) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        let change = if refreshed {
            AuthChange::TokenRefreshed(session)
        } else {
            AuthChange::SignedIn(session)
        };
        self.hub.emit(&change);
    }

    fn clear_session(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.hub.emit(&AuthChange::SignedOut);
    }

    /// Checks HTTP response status; returns the response on success or a
    /// [`Error::Provider`] carrying whatever the service sent back.
    pub(crate) async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => (parsed.code, parsed.message.unwrap_or(body)),
            Err(_) => (None, body),
        };
        Err(Error::Provider {
            operation,
            status: Some(status),
            code,
            message,
        })
    }
}

impl IdentityProvider for AuthClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, Error> {
        let response = self
            .http
            .post(self.api_url("auth/password"))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&PasswordGrant { email, password })
            .send()
            .await?;
        let response = Self::ensure_success(response, "sign-in").await?;
        let session = response.json::<Session>().await?;
        self.install_session(session.clone(), false);
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<Session, Error> {
        let response = self
            .http
            .post(self.api_url("auth/signup"))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&SignupRequest {
                email,
                password,
                name,
            })
            .send()
            .await?;
        let response = Self::ensure_success(response, "signup").await?;
        let session = response.json::<Session>().await?;
        self.install_session(session.clone(), false);
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), Error> {
        if let Some(session) = self.current_session() {
            let response = self
                .http
                .post(self.api_url("auth/logout"))
                .header(API_KEY_HEADER, &self.config.api_key)
                .bearer_auth(&session.access_token)
                .send()
                .await?;
            Self::ensure_success(response, "sign-out").await?;
        }
        self.clear_session();
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, Error> {
        Ok(self.current_session())
    }

    async fn get_user(&self) -> Result<Option<User>, Error> {
        let Some(session) = self.current_session() else {
            return Ok(None);
        };
        let response = self
            .http
            .get(self.api_url("auth/user"))
            .header(API_KEY_HEADER, &self.config.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        let response = Self::ensure_success(response, "userinfo request").await?;
        Ok(Some(response.json::<User>().await?))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, Error> {
        let response = self
            .http
            .post(self.api_url("auth/refresh"))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;
        let response = Self::ensure_success(response, "token refresh").await?;
        let session = response.json::<Session>().await?;
        self.install_session(session.clone(), true);
        Ok(session)
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), Error> {
        let response = self
            .http
            .post(self.api_url("auth/recover"))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&RecoverRequest { email })
            .send()
            .await?;
        Self::ensure_success(response, "password reset request").await?;
        Ok(())
    }

    async fn verify_email(&self, email: &str, code: &str) -> Result<Session, Error> {
        let response = self
            .http
            .post(self.api_url("auth/verify"))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&VerifyRequest { email, code })
            .send()
            .await?;
        let response = Self::ensure_success(response, "email verification").await?;
        let session = response.json::<Session>().await?;
        self.install_session(session.clone(), false);
        Ok(session)
    }

    fn subscribe_auth_changes(&self, listener: AuthListener) -> AuthSubscription {
        self.hub.subscribe(listener)
    }

    #[cfg(feature = "oauth")]
    fn begin_oauth(
        &self,
        provider: crate::types::OAuthProvider,
    ) -> Result<crate::oauth::AuthorizationRequest, Error> {
        self.authorization_request(provider)
    }
}

pub(crate) const API_KEY_HEADER: &str = "mid-api-key";

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignupRequest<'a> {
    email: &'a str,
    password: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct RecoverRequest<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    email: &'a str,
    code: &'a str,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Fan-out registry for auth-change listeners.
#[derive(Default)]
struct ListenerHub {
    entries: Arc<Mutex<Vec<(u64, AuthListener)>>>,
    next_id: AtomicU64,
}

impl ListenerHub {
    fn subscribe(&self, listener: AuthListener) -> AuthSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));

        let entries = Arc::clone(&self.entries);
        AuthSubscription::new(move || {
            entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(entry_id, _)| *entry_id != id);
        })
    }

    fn emit(&self, change: &AuthChange) {
        // Snapshot the listener list so callbacks run without the lock held.
        let listeners: Vec<AuthListener> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(change);
        }
    }
}

/// Process-wide slot holding the one [`AuthClient`].
///
/// The first successful [`initialize`](ClientCell::initialize) wins; later
/// calls return the existing handle unchanged regardless of their
/// arguments, so a second, possibly attacker-controlled endpoint cannot
/// silently replace the trusted one mid-session. An explicitly constructed
/// cell (rather than an ambient global) keeps the handle injectable and
/// trivially replaceable in tests.
pub struct ClientCell {
    inner: Mutex<Option<Arc<AuthClient>>>,
}

impl ClientCell {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Construct the client on first call; return the existing handle on
    /// every later call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no client exists yet and the inputs
    /// fail validation. Construction is local and synchronous; failures
    /// are configuration mistakes, not transient conditions.
    pub fn initialize(&self, endpoint: &str, api_key: &str) -> Result<Arc<AuthClient>, Error> {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = slot.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let config = ClientConfig::new(endpoint, api_key)?;
        let client = Arc::new(AuthClient::new(config));
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    /// [`initialize`](ClientCell::initialize) with a prebuilt configuration.
    pub fn initialize_with(&self, config: ClientConfig) -> Arc<AuthClient> {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = slot.as_ref() {
            return Arc::clone(existing);
        }
        let client = Arc::new(AuthClient::new(config));
        *slot = Some(Arc::clone(&client));
        client
    }

    /// [`initialize`](ClientCell::initialize) from `MID_ENDPOINT` /
    /// `MID_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no client exists yet and the
    /// environment is incomplete.
    pub fn initialize_from_env(&self) -> Result<Arc<AuthClient>, Error> {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = slot.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let client = Arc::new(AuthClient::new(ClientConfig::from_env()?));
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    /// The initialized handle, if any.
    #[must_use]
    pub fn get(&self) -> Option<Arc<AuthClient>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for ClientCell {
    fn default() -> Self {
        Self::new()
    }
}
