//! Input validation for API requests.
//!
//! Each check returns `Err(message)` for the caller to attach to a field.
//! For collecting multiple validation errors and returning them as an
//! ApiError, use the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

use super::error::ValidationErrorBuilder;
use crate::db::RegisterRequest;

lazy_static! {
    /// Regex for validating email addresses
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?)*\.[a-zA-Z]{2,}$"
    ).unwrap();

    /// Characters allowed in a phone number besides digits
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9()\-\s]+$").unwrap();
}

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 50;
const PHONE_MIN_DIGITS: usize = 10;

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a password against the configured minimum length
pub fn validate_password(password: &str, min_length: usize) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.chars().count() < min_length {
        return Err(format!("Password must be at least {} characters", min_length));
    }

    Ok(())
}

/// Validate a first or last name
pub fn validate_name(name: &str, label: &str) -> Result<(), String> {
    let len = name.trim().chars().count();
    if len == 0 {
        return Err(format!("{} is required", label));
    }

    if len < NAME_MIN_CHARS {
        return Err(format!("{} is too short (min {} characters)", label, NAME_MIN_CHARS));
    }

    if len > NAME_MAX_CHARS {
        return Err(format!("{} is too long (max {} characters)", label, NAME_MAX_CHARS));
    }

    Ok(())
}

/// Validate an optional phone number; empty counts as absent
pub fn validate_phone(phone: &Option<String>) -> Result<(), String> {
    let Some(phone) = phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(());
    };

    if !PHONE_REGEX.is_match(phone) {
        return Err("Invalid phone number".to_string());
    }

    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if digits < PHONE_MIN_DIGITS {
        return Err(format!("Phone number must contain at least {} digits", PHONE_MIN_DIGITS));
    }

    Ok(())
}

/// Validate all registration fields at once
pub fn validate_registration(
    req: &RegisterRequest,
    min_password_length: usize,
) -> Result<(), super::error::ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("email", validate_email(&req.email))
        .check("password", validate_password(&req.password, min_password_length))
        .check("first_name", validate_name(&req.first_name, "First name"))
        .check("last_name", validate_name(&req.last_name, "Last name"))
        .check("phone", validate_phone(&req.phone));
    errors.finish()
}
