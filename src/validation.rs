//! Client-side form checks.
//!
//! Every check returns `Err(message)` with the text shown next to the field,
//! so forms can fold them into [`ValidationErrors`](crate::error::ValidationErrors)
//! before any request leaves the client.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

fn mrn_regex() -> &'static Regex {
    static MRN: OnceLock<Regex> = OnceLock::new();
    MRN.get_or_init(|| Regex::new(r"^[A-Z]{2,4}-\d{6,10}$").expect("static MRN pattern"))
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]{2,}$").expect("static email pattern")
    })
}

/// Medical record numbers look like `MRN-004512`: a 2-4 letter facility
/// prefix, a hyphen, then 6-10 digits. Surrounding whitespace is ignored.
pub fn validate_mrn(mrn: &str) -> Result<(), String> {
    let mrn = mrn.trim();
    if mrn.is_empty() {
        return Err("MRN is required".to_string());
    }
    if !mrn_regex().is_match(mrn) {
        return Err("MRN must look like MRN-004512".to_string());
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if !email_regex().is_match(email) {
        return Err("Enter a valid email address".to_string());
    }
    Ok(())
}

pub fn validate_required(value: &str, label: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{label} is required"))
    } else {
        Ok(())
    }
}

/// Coarse password strength bucket shown under the password field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordStrength {
    Weak,
    Fair,
    Good,
    Strong,
}

/// Score a password from 0 to 4.
///
/// One point each for: length of at least 8, mixed case, a digit, a symbol.
/// Passwords of 12+ characters earn a bonus point; the total is capped at 4.
pub fn password_score(password: &str) -> u8 {
    let len = password.chars().count();
    let mut score = 0u8;
    if len >= MIN_PASSWORD_LEN {
        score += 1;
    }
    if password.chars().any(char::is_lowercase) && password.chars().any(char::is_uppercase) {
        score += 1;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        score += 1;
    }
    if password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
        score += 1;
    }
    if len >= 12 {
        score += 1;
    }
    score.min(4)
}

pub fn password_strength(password: &str) -> PasswordStrength {
    match password_score(password) {
        0 | 1 => PasswordStrength::Weak,
        2 => PasswordStrength::Fair,
        3 => PasswordStrength::Good,
        _ => PasswordStrength::Strong,
    }
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if password_strength(password) < PasswordStrength::Fair {
        return Err("Password is too weak; mix cases, digits or symbols".to_string());
    }
    Ok(())
}

pub fn validate_password_match(password: &str, confirmation: &str) -> Result<(), String> {
    if password != confirmation {
        Err("Passwords do not match".to_string())
    } else {
        Ok(())
    }
}
