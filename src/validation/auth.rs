use garde::Validate;

use crate::error::{AppError, FieldErrors, Result};

/// Minimum username length in characters.
pub const USERNAME_MIN_LEN: usize = 3;
/// Maximum username length in characters.
pub const USERNAME_MAX_LEN: usize = 20;
/// Minimum password length in characters.
pub const PASSWORD_MIN_LEN: usize = 8;

#[derive(Validate)]
struct EmailAddress<'a> {
    #[garde(email)]
    email: &'a str,
}

/// Escapes the five HTML metacharacters `& < > " '`.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Syntactic email check only; no DNS or MX lookup.
pub fn validate_email(email: &str) -> bool {
    EmailAddress { email }.validate().is_ok()
}

/// Requires the confirmation to match and at least eight characters with one
/// lowercase letter, one uppercase letter, one digit and one symbol.
///
/// A symbol is anything outside ASCII letters and digits, underscore included.
pub fn validate_password_strength(password: &str, confirmation: &str) -> bool {
    if password != confirmation {
        return false;
    }

    password.chars().count() >= PASSWORD_MIN_LEN
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_ascii_alphanumeric())
}

/// Length in `[3, 20]` characters, and unchanged by HTML escaping.
pub fn validate_username(username: &str) -> bool {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return false;
    }

    escape_html(username) == username
}

/// Runs the registration checks and collects one message per failing field.
pub fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
    confirmation: &str,
) -> Result<()> {
    let mut errors = FieldErrors::new();

    if !validate_username(username) {
        errors.insert("username", "Invalid username".to_string());
    }

    if !validate_email(email) {
        errors.insert("email", "Invalid email".to_string());
    }

    if !validate_password_strength(password, confirmation) {
        errors.insert("password", "Invalid password".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Runs the checks for a profile edit: username and email only.
pub fn validate_profile(username: &str, email: &str) -> Result<()> {
    let mut errors = FieldErrors::new();

    if !validate_username(username) {
        errors.insert("username", "Invalid username".to_string());
    }

    if !validate_email(email) {
        errors.insert("email", "Invalid email".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}
