//! Account invariants shared by registration and the command line.

use super::error::DomainError;

pub const MAX_USERNAME_LEN: usize = 150;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Path segments that are routes of their own and therefore cannot be
/// claimed as profile URLs.
pub const RESERVED_USERNAMES: &[&str] = &["auth", "follow", "group", "media", "new", "_health"];

/// Usernames compare case-insensitively under full Unicode lowercasing, the
/// same folding the lookup index applies.
pub fn same_username(left: &str, right: &str) -> bool {
    left == right || left.to_lowercase() == right.to_lowercase()
}

pub fn validate_username(username: &str) -> Result<(), DomainError> {
    if username.is_empty() {
        return Err(DomainError::validation("username", "This field is required."));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(DomainError::validation(
            "username",
            format!("Ensure this value has at most {MAX_USERNAME_LEN} characters."),
        ));
    }
    let allowed = username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '.' | '@' | '+' | '-'));
    if !allowed {
        return Err(DomainError::validation(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    if username.chars().all(|ch| ch == '.') {
        return Err(DomainError::validation(
            "username",
            "Enter a valid username. This value may not consist of dots only.",
        ));
    }
    let lowered = username.to_lowercase();
    if RESERVED_USERNAMES.contains(&lowered.as_str()) {
        return Err(DomainError::validation(
            "username",
            "This username is reserved.",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), DomainError> {
    if email.is_empty() {
        return Err(DomainError::validation("email", "This field is required."));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(DomainError::validation("email", "Enter a valid email address.")),
    }
}

pub fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(
            "password2",
            format!(
                "This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."
            ),
        ));
    }
    if password.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(DomainError::validation(
            "password2",
            "This password is entirely numeric.",
        ));
    }
    Ok(())
}
