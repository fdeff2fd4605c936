//! Input validation for registration, login and profile updates
//!
//! Rules are checked in a fixed order and the first failure is reported.

use crate::{
    error::AppError,
    models::auth::{LoginRequest, RegisterRequest},
};
use validator::ValidateEmail;

pub const EMAIL_REQUIRED: &str = "Email is required";
pub const PASSWORD_REQUIRED: &str = "Password is required";
pub const INVALID_EMAIL: &str = "Please enter a valid email address";
pub const EMAIL_EXISTS: &str = "User with this email already exists";
pub const EMAIL_TAKEN: &str = "Email already taken";
pub const LOGIN_FIELDS_REQUIRED: &str = "Email and password are required";
pub const REFRESH_REQUIRED: &str = "Refresh token is required";

/// Column widths of the users table
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const NAME_MAX_LENGTH: usize = 150;

/// Registration input that passed every syntactic rule
#[derive(Debug)]
pub struct ValidRegistration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Trim and lower-case the domain part; the local part is kept as typed
pub fn normalize_email(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => trimmed.to_string(),
    }
}

/// RFC-style check plus a dotted domain
pub fn is_valid_email(email: &str) -> bool {
    email.chars().count() <= EMAIL_MAX_LENGTH
        && email.validate_email()
        && email
            .rsplit_once('@')
            .is_some_and(|(_, domain)| domain.contains('.') && !domain.ends_with('.'))
}

pub fn password_too_short_message(min_length: usize) -> String {
    format!("Password must be at least {} characters long", min_length)
}

/// Reject names that do not fit the users table
pub fn check_name_length(label: &str, value: Option<&str>) -> Result<(), AppError> {
    match value {
        Some(v) if v.chars().count() > NAME_MAX_LENGTH => Err(AppError::Validation(format!(
            "{} must be at most {} characters long",
            label, NAME_MAX_LENGTH
        ))),
        _ => Ok(()),
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// email presence -> email format -> password presence -> password length
pub fn validate_registration(
    req: RegisterRequest,
    password_min_length: usize,
) -> Result<ValidRegistration, AppError> {
    let email = present(&req.email)
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::validation(EMAIL_REQUIRED))?;

    if !is_valid_email(&email) {
        return Err(AppError::validation(INVALID_EMAIL));
    }

    let password = present(&req.password).ok_or_else(|| AppError::validation(PASSWORD_REQUIRED))?;

    if password.chars().count() < password_min_length {
        return Err(AppError::Validation(password_too_short_message(password_min_length)));
    }

    check_name_length("First name", req.first_name.as_deref())?;
    check_name_length("Last name", req.last_name.as_deref())?;

    Ok(ValidRegistration {
        email,
        password: password.to_string(),
        first_name: req.first_name.unwrap_or_default(),
        last_name: req.last_name.unwrap_or_default(),
    })
}

/// Both fields must be present; returns the normalised email and the password
pub fn validate_login(req: &LoginRequest) -> Result<(String, String), AppError> {
    match (present(&req.email), present(&req.password)) {
        (Some(email), Some(password)) => Ok((normalize_email(email), password.to_string())),
        _ => Err(AppError::validation(LOGIN_FIELDS_REQUIRED)),
    }
}
