//! User-facing failure messages.
//!
//! Every failure leaving this crate is one of the [`AuthMessage`] variants
//! below. Raw MID error text never reaches a user: wrong password, unknown
//! email, locked account, and too-many-attempts all collapse to the same
//! generic credentials message, so responses cannot be used to probe which
//! addresses have accounts.

use crate::error::Error;

/// Closed set of user-safe failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum AuthMessage {
    /// Covers wrong password, unknown email, locked account, and
    /// too-many-attempts. Intentionally indistinguishable.
    InvalidCredentials,
    /// Signup conflict, phrased without confirming the address exists.
    EmailAlreadyExists,
    WeakPassword,
    InvalidEmail,
    InvalidResetToken,
    TokenExpired,
    InvalidVerificationCode,
    CodeExpired,
    NetworkError,
    ServerUnavailable,
    Timeout,
    Unknown,
}

impl AuthMessage {
    /// Fixed display text for this message.
    #[must_use]
    pub const fn user_text(self) -> &'static str {
        match self {
            Self::InvalidCredentials => {
                "Incorrect email or password. Check your details and try again."
            }
            Self::EmailAlreadyExists => {
                "We could not create the account. Check your details and try again."
            }
            Self::WeakPassword => {
                "Password is too weak. Use 8+ characters with upper and lower \
                 case letters, a number, and a symbol."
            }
            Self::InvalidEmail => "That email address looks invalid. Check it and try again.",
            Self::InvalidResetToken => {
                "This reset link is invalid or has expired. Request a new one."
            }
            Self::TokenExpired => "This link has expired. Request a new password reset.",
            Self::InvalidVerificationCode => "Invalid code. Check the code you received.",
            Self::CodeExpired => "This code has expired. Request a new one.",
            Self::NetworkError => "Connection problem. Check your network and try again.",
            Self::ServerUnavailable => {
                "The service is temporarily unavailable. Try again shortly."
            }
            Self::Timeout => "The request took too long. Try again.",
            Self::Unknown => "Something unexpected went wrong. Try again.",
        }
    }
}

impl std::fmt::Display for AuthMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.user_text())
    }
}

/// Outcome of a password-reset request, after the anti-enumeration policy
/// has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordResetOutcome {
    /// Show "email sent". Also returned for rejections such as
    /// unknown-address, which must not be distinguishable from success.
    EmailSent,
    /// Transport-level failure. Safe to surface: it says nothing about the
    /// account.
    Failed(AuthMessage),
}

/// Map a failure to its user-safe message.
///
/// Structured MID codes win over message text. Same input, same output;
/// no I/O.
#[must_use]
pub fn normalize(error: &Error) -> AuthMessage {
    match error {
        Error::Provider { code, message, .. } => {
            if let Some(mapped) = code.as_deref().and_then(from_code) {
                return mapped;
            }
            normalize_message(message)
        }
        Error::Http(e) => {
            if e.is_timeout() {
                AuthMessage::Timeout
            } else if matches!(e.status().map(|s| s.as_u16()), Some(502 | 503 | 504)) {
                AuthMessage::ServerUnavailable
            } else {
                AuthMessage::NetworkError
            }
        }
        Error::Config(_) => AuthMessage::Unknown,
    }
}

/// Map raw failure text to its user-safe message.
///
/// The substring order is load-bearing: "not found" is checked before
/// "invalid" so that text like "invalid: user not found" lands on the same
/// generic message as "invalid credentials". Account-status text ("locked",
/// "too many") collapses there as well.
#[must_use]
pub fn normalize_message(message: &str) -> AuthMessage {
    let message = message.to_lowercase();

    if message.contains("not found") {
        return AuthMessage::InvalidCredentials;
    }
    if message.contains("invalid") || message.contains("incorrect") {
        return AuthMessage::InvalidCredentials;
    }
    if message.contains("locked") {
        return AuthMessage::InvalidCredentials;
    }
    if message.contains("too many") {
        return AuthMessage::InvalidCredentials;
    }
    if message.contains("already exists") || message.contains("already registered") {
        return AuthMessage::EmailAlreadyExists;
    }
    if message.contains("weak password") {
        return AuthMessage::WeakPassword;
    }
    if message.contains("network") || message.contains("connection") {
        return AuthMessage::NetworkError;
    }
    if message.contains("timed out") || message.contains("timeout") {
        return AuthMessage::Timeout;
    }
    if message.contains("unavailable") {
        return AuthMessage::ServerUnavailable;
    }

    AuthMessage::Unknown
}

/// Apply the password-reset anti-enumeration policy to a failed request.
///
/// Only transport failures surface as errors. Everything else, including
/// "no such address", reads as success.
#[must_use]
pub fn password_reset_outcome(error: &Error) -> PasswordResetOutcome {
    match normalize(error) {
        msg @ (AuthMessage::NetworkError | AuthMessage::ServerUnavailable | AuthMessage::Timeout) => {
            PasswordResetOutcome::Failed(msg)
        }
        _ => PasswordResetOutcome::EmailSent,
    }
}

fn from_code(code: &str) -> Option<AuthMessage> {
    let message = match code {
        "INVALID_CREDENTIALS" | "EMAIL_NOT_FOUND" | "ACCOUNT_LOCKED" | "TOO_MANY_ATTEMPTS" => {
            AuthMessage::InvalidCredentials
        }
        "EMAIL_ALREADY_EXISTS" => AuthMessage::EmailAlreadyExists,
        "WEAK_PASSWORD" => AuthMessage::WeakPassword,
        "INVALID_EMAIL" => AuthMessage::InvalidEmail,
        "INVALID_RESET_TOKEN" => AuthMessage::InvalidResetToken,
        "TOKEN_EXPIRED" => AuthMessage::TokenExpired,
        "INVALID_VERIFICATION_CODE" => AuthMessage::InvalidVerificationCode,
        "CODE_EXPIRED" => AuthMessage::CodeExpired,
        "NETWORK_ERROR" => AuthMessage::NetworkError,
        "SERVER_UNAVAILABLE" => AuthMessage::ServerUnavailable,
        "TIMEOUT" => AuthMessage::Timeout,
        _ => return None,
    };
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_error(code: Option<&str>, message: &str) -> Error {
        Error::Provider {
            operation: "sign-in",
            status: Some(400),
            code: code.map(str::to_owned),
            message: message.to_owned(),
        }
    }

    #[test]
    fn known_codes_map_directly() {
        let err = provider_error(Some("WEAK_PASSWORD"), "anything at all");
        assert_eq!(normalize(&err), AuthMessage::WeakPassword);
    }

    #[test]
    fn unknown_email_and_wrong_password_are_indistinguishable() {
        let not_found = provider_error(Some("EMAIL_NOT_FOUND"), "");
        let wrong_password = provider_error(Some("INVALID_CREDENTIALS"), "");
        let not_found_text = provider_error(None, "User not found");

        assert_eq!(normalize(&not_found), AuthMessage::InvalidCredentials);
        assert_eq!(normalize(&not_found), normalize(&wrong_password));
        assert_eq!(normalize(&not_found_text), normalize(&wrong_password));
    }

    #[test]
    fn not_found_wins_over_invalid() {
        // Both substrings present; "not found" must be checked first.
        assert_eq!(
            normalize_message("invalid user not found"),
            AuthMessage::InvalidCredentials
        );
    }

    #[test]
    fn account_status_collapses_to_credentials_message() {
        assert_eq!(
            normalize_message("account locked"),
            AuthMessage::InvalidCredentials
        );
        assert_eq!(
            normalize_message("too many attempts"),
            AuthMessage::InvalidCredentials
        );
    }

    #[test]
    fn operational_failures_stay_distinct() {
        assert_eq!(normalize_message("network down"), AuthMessage::NetworkError);
        assert_eq!(normalize_message("request timed out"), AuthMessage::Timeout);
        assert_eq!(
            normalize_message("service unavailable"),
            AuthMessage::ServerUnavailable
        );
    }

    #[test]
    fn unrecognized_input_falls_back_to_unknown() {
        assert_eq!(normalize_message("quantum flux error"), AuthMessage::Unknown);
        let err = provider_error(Some("SOME_FUTURE_CODE"), "quantum flux error");
        assert_eq!(normalize(&err), AuthMessage::Unknown);
    }

    #[test]
    fn normalization_is_pure() {
        let err = provider_error(None, "Invalid credentials");
        assert_eq!(normalize(&err), normalize(&err));
    }

    #[test]
    fn password_reset_swallows_account_errors() {
        let unknown_address = provider_error(Some("EMAIL_NOT_FOUND"), "user not found");
        assert_eq!(
            password_reset_outcome(&unknown_address),
            PasswordResetOutcome::EmailSent
        );

        let unexpected = provider_error(None, "quantum flux error");
        assert_eq!(
            password_reset_outcome(&unexpected),
            PasswordResetOutcome::EmailSent
        );
    }

    #[test]
    fn password_reset_surfaces_transport_failures() {
        let offline = provider_error(Some("NETWORK_ERROR"), "network unreachable");
        assert_eq!(
            password_reset_outcome(&offline),
            PasswordResetOutcome::Failed(AuthMessage::NetworkError)
        );
    }
}
