use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::dto::{LoginRequest, RegisterRequest};
use crate::error::FieldError;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Password policy: >= 8 chars with upper, lower, digit and a special
/// character. Returns one error per missing property.
pub fn password_errors(password: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if password.len() < 8 {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 8 characters",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push(FieldError::new(
            "password",
            "Password must contain an uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push(FieldError::new(
            "password",
            "Password must contain a lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push(FieldError::new("password", "Password must contain a digit"));
    }
    if password.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.push(FieldError::new(
            "password",
            "Password must contain a special character",
        ));
    }
    errors
}

/// Register payload after validation: email normalized to lowercase,
/// password known to meet the policy.
#[derive(Debug)]
pub struct ParsedRegister {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// Login payload after validation. Password complexity is deliberately not
/// re-checked here; only shape matters at login time.
#[derive(Debug)]
pub struct ParsedLogin {
    pub email: String,
    pub password: String,
}

pub fn parse_register(req: &RegisterRequest) -> Result<ParsedRegister, Vec<FieldError>> {
    let email = req.email.trim().to_lowercase();
    let mut errors = Vec::new();
    if !is_valid_email(&email) {
        errors.push(FieldError::new("email", "Invalid email address"));
    }
    errors.extend(password_errors(&req.password));
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from);
    if errors.is_empty() {
        Ok(ParsedRegister {
            email,
            password: req.password.clone(),
            name,
        })
    } else {
        Err(errors)
    }
}

pub fn parse_login(req: &LoginRequest) -> Result<ParsedLogin, Vec<FieldError>> {
    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(vec![FieldError::new("email", "Invalid email address")]);
    }
    if req.password.is_empty() {
        return Err(vec![FieldError::new("password", "Password is required")]);
    }
    Ok(ParsedLogin {
        email,
        password: req.password.clone(),
    })
}
