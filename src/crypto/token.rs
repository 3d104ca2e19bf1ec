use crate::error::{AppError, Result};
use rand::RngCore;
use rand::rngs::OsRng;
use base64::{Engine as _, engine::general_purpose};

/// The size of a session token in bytes.
const SESSION_TOKEN_SIZE: usize = 32;

/// Generates a new random session token.
///
/// # Returns
///
/// A URL-safe base64-encoded token, 43 characters long.
pub fn generate_session_token() -> Result<String> {
    let mut token = [0u8; SESSION_TOKEN_SIZE];
    OsRng
        .try_fill_bytes(&mut token)
        .map_err(|e| AppError::Internal(format!("Failed to generate session token: {}", e)))?;

    Ok(general_purpose::URL_SAFE_NO_PAD.encode(token))
}

/// Whether `s` could have been produced by [`generate_session_token`].
///
/// Lets callers drop garbage cookies without a store round trip.
pub fn is_well_formed(s: &str) -> bool {
    general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map(|bytes| bytes.len() == SESSION_TOKEN_SIZE)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_well_formed() {
        let a = generate_session_token().unwrap();
        let b = generate_session_token().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(is_well_formed(&a));
        assert!(is_well_formed(&b));
    }

    #[test]
    fn rejects_garbage() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("session123"));
        assert!(!is_well_formed("not base64 at all!"));
    }
}
