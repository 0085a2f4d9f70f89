/// Validates an email address shape.
///
/// Accepts what the MID API accepts:
/// - At most 255 characters, no whitespace
/// - Exactly one `@` with a non-empty local part
/// - A dotted domain that neither starts nor ends with `.`
#[must_use]
pub fn is_valid_email(s: &str) -> bool {
    if s.is_empty() || s.len() > 255 || s.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
}

/// Validates the signup password policy.
///
/// 8 to 100 characters with at least one uppercase letter, one lowercase
/// letter, one digit, and one symbol.
#[must_use]
pub fn is_strong_password(s: &str) -> bool {
    let length = s.chars().count();
    (8..=100).contains(&length)
        && s.chars().any(char::is_uppercase)
        && s.chars().any(char::is_lowercase)
        && s.chars().any(|c| c.is_ascii_digit())
        && s.chars().any(|c| !c.is_alphanumeric())
}
