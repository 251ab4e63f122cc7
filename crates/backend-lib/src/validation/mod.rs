// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Request field validation.

use crate::auth::{validate_password_strength, PasswordRequirements, MAX_PASSWORD_LENGTH};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 32;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());
static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap());

/// Possible validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate an email and return its normalized (trimmed, lower-cased) form
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::MissingField("email"));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "Email must not exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Email address format is invalid".to_string(),
        ));
    }

    Ok(email.to_ascii_lowercase())
}

/// Validate a username and return its trimmed form
pub fn validate_username(username: &str) -> ValidationResult<String> {
    let username = username.trim();

    if username.is_empty() {
        return Err(ValidationError::MissingField("username"));
    }

    if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::InvalidUsername(format!(
            "Username must be between {MIN_USERNAME_LENGTH} and {MAX_USERNAME_LENGTH} characters"
        )));
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(ValidationError::InvalidUsername(
            "Username may contain only letters, digits, '_', '.' and '-'".to_string(),
        ));
    }

    Ok(username.to_string())
}

/// Validate a new password against the configured requirements
pub fn validate_new_password<'a>(
    password: &'a str,
    requirements: &PasswordRequirements,
) -> ValidationResult<&'a str> {
    if password.is_empty() {
        return Err(ValidationError::MissingField("password"));
    }

    if !validate_password_strength(password, requirements) {
        let mut rules = vec![format!(
            "{} to {MAX_PASSWORD_LENGTH} characters",
            requirements.min_length
        )];
        if requirements.require_uppercase {
            rules.push("an uppercase letter".to_string());
        }
        if requirements.require_lowercase {
            rules.push("a lowercase letter".to_string());
        }
        if requirements.require_digit {
            rules.push("a digit".to_string());
        }
        if requirements.require_special {
            rules.push("a special character".to_string());
        }
        return Err(ValidationError::InvalidPassword(format!(
            "Password must have {}",
            rules.join(", ")
        )));
    }

    Ok(password)
}

/// A supplied secret (login or old password) only has to be present and bounded
pub fn validate_supplied_password(password: &str) -> ValidationResult<&str> {
    if password.is_empty() {
        return Err(ValidationError::MissingField("password"));
    }
    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must not exceed {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(password)
}
