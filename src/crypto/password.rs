use crate::error::{AppError, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder,
};
use rand::{RngCore, rngs::OsRng};
use zeroize::Zeroize;

/// The memory cost for Argon2 in MB.
const ARGON2_MEMORY_MB: u32 = 19;
/// The number of iterations for Argon2.
const ARGON2_ITERATIONS: u32 = 3;
/// The parallelism factor for Argon2.
const ARGON2_PARALLELISM: u32 = 1;
/// Salt length in bytes.
const SALT_LEN: usize = 16;

fn argon2() -> Result<Argon2<'static>> {
    let params = ParamsBuilder::new()
        .m_cost(ARGON2_MEMORY_MB * 1024)
        .t_cost(ARGON2_ITERATIONS)
        .p_cost(ARGON2_PARALLELISM)
        .build()
        .map_err(|e| AppError::Internal(format!("Argon2 params: {}", e)))?;

    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// Hashes a password using Argon2id with a fresh random salt.
///
/// The result is a PHC string (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`)
/// carrying everything [`verify_password`] needs.
pub fn hash_password(password: &str) -> Result<String> {
    let mut password_bytes = password.as_bytes().to_vec();

    let mut salt_bytes = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|e| AppError::Internal(format!("Failed to generate salt: {}", e)))?;

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("Salt encoding error: {}", e)))?;

    let password_hash = argon2()?
        .hash_password(&password_bytes, &salt)
        .map_err(|e| AppError::Internal(format!("Argon2 hash error: {}", e)))?
        .to_string();

    password_bytes.zeroize();
    salt_bytes.zeroize();
    tracing::debug!("Password hashed successfully with Argon2");
    Ok(password_hash)
}

/// Verifies a password against a stored PHC string.
///
/// A hash that does not parse verifies as `false`. Cost parameters are read
/// from the hash itself, so hashes written under older settings still verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Stored hash did not parse: {}", e);
            return false;
        }
    };

    let mut password_bytes = password.as_bytes().to_vec();
    let result = Argon2::default()
        .verify_password(&password_bytes, &parsed_hash)
        .is_ok();

    password_bytes.zeroize();
    tracing::debug!("Password verification completed");
    result
}
