//! PKCE-based OAuth login against the MID federation endpoints.
//!
//! [`begin_oauth`](crate::provider::IdentityProvider::begin_oauth) builds
//! the authorization URL the host navigates to; once MID redirects back,
//! the host exchanges the code with [`AuthClient::complete_oauth`], which
//! installs the session and notifies listeners like any other sign-in.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::client::{API_KEY_HEADER, AuthClient};
use crate::error::Error;
use crate::types::{OAuthProvider, Session};

/// Authorization URL with the PKCE parameters the host must hold on to
/// until the callback.
#[non_exhaustive]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
}

impl AuthClient {
    pub(crate) fn authorization_request(
        &self,
        provider: OAuthProvider,
    ) -> Result<AuthorizationRequest, Error> {
        let redirect_uri = self.config().redirect_uri.as_ref().ok_or_else(|| {
            Error::Config("redirect URI is required for OAuth login".into())
        })?;

        let state = generate_state();
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);

        let mut url = self.api_url("oauth/authorize");
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("provider", provider.slug())
            .append_pair("client_key", &self.config().api_key)
            .append_pair("redirect_uri", redirect_uri.as_str())
            .append_pair("state", &state)
            .append_pair("code_challenge", &code_challenge)
            .append_pair("code_challenge_method", "S256");

        Ok(AuthorizationRequest {
            url: url.into(),
            state,
            code_verifier,
        })
    }

    /// Exchange an authorization code for a session using PKCE.
    ///
    /// Emits a signed-in auth change on success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no redirect URI is configured,
    /// [`Error::Http`] on network failure, or [`Error::Provider`] if MID
    /// rejects the exchange.
    pub async fn complete_oauth(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<Session, Error> {
        let redirect_uri = self.config().redirect_uri.as_ref().ok_or_else(|| {
            Error::Config("redirect URI is required for OAuth login".into())
        })?;

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("code_verifier", code_verifier),
        ];
        let response = self
            .http()
            .post(self.api_url("oauth/token"))
            .header(API_KEY_HEADER, &self.config().api_key)
            .form(&params)
            .send()
            .await?;
        let response = Self::ensure_success(response, "oauth token exchange").await?;
        let session = response.json::<Session>().await?;
        self.install_session(session.clone(), false);
        Ok(session)
    }
}

/// Cryptographically random PKCE code verifier (RFC 7636: 43-128 chars).
fn generate_code_verifier() -> String {
    let random_bytes: [u8; 48] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// S256 code challenge: `BASE64URL(SHA256(verifier))`.
fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Cryptographically random OAuth state parameter.
fn generate_state() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}
