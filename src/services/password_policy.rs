//! Password complexity rules shared by every path that accepts a new
//! password (interactive change, admin create/reset, CLI).

use thiserror::Error;

/// Minimum password length, counted in characters rather than bytes.
pub const MIN_PASSWORD_LENGTH: usize = 10;

/// Characters that satisfy the special-character requirement.
pub const SPECIAL_CHARS: &str = r#"!@#$%^&*(),.?":{}|<>"#;

/// A rejected password, carrying the user-facing reason.
///
/// Checks run in a fixed order and the first failure is reported, so a
/// password missing several things surfaces one message at a time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters long")]
    TooShort,

    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,

    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,

    #[error("Password must contain at least one number")]
    MissingDigit,

    #[error("Password must contain at least one special character")]
    MissingSpecial,

    #[error("New password must be different from the current password")]
    SameAsPrevious,
}

/// Validate a candidate password, optionally against the password it
/// replaces.
///
/// # Errors
///
/// Returns the first [`PolicyViolation`] in check order: length, uppercase,
/// lowercase, number, special character, then same-as-previous.
pub fn validate_password(candidate: &str, previous: Option<&str>) -> Result<(), PolicyViolation> {
    if candidate.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PolicyViolation::TooShort);
    }

    if !candidate.chars().any(char::is_uppercase) {
        return Err(PolicyViolation::MissingUppercase);
    }

    if !candidate.chars().any(char::is_lowercase) {
        return Err(PolicyViolation::MissingLowercase);
    }

    if !candidate.chars().any(|c| c.is_ascii_digit()) {
        return Err(PolicyViolation::MissingDigit);
    }

    if !candidate.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        return Err(PolicyViolation::MissingSpecial);
    }

    if previous.is_some_and(|prev| prev == candidate) {
        return Err(PolicyViolation::SameAsPrevious);
    }

    Ok(())
}
