// src/services/auth_service.rs

//! Password hashing and verification for account records.

use crate::errors::AppError;
use argon2::{
  password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use tracing::{debug, error, instrument};

/// Hashes a plain-text password with Argon2 (default parameters, random salt).
#[instrument(name = "auth_service::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String, AppError> {
  if password.is_empty() {
    return Err(AppError::InvalidInput("Password cannot be empty".to_string()));
  }

  let salt = SaltString::generate(&mut OsRng);
  match Argon2::default().hash_password(password.as_bytes(), &salt) {
    Ok(password_hash) => {
      debug!("Password hashed successfully.");
      Ok(password_hash.to_string())
    }
    Err(argon_err) => {
      error!(error = %argon_err, "Argon2 password hashing failed.");
      Err(AppError::Internal(format!("Password hashing failed: {}", argon_err)))
    }
  }
}

/// Checks `provided_password` against a stored Argon2 hash.
///
/// `Ok(false)` on mismatch; `Err` only when the stored hash itself is unusable.
#[instrument(
  name = "auth_service::verify_password",
  skip(stored_hash, provided_password),
  fields(hash_len = stored_hash.len()),
  err(Display)
)]
pub fn verify_password(stored_hash: &str, provided_password: &str) -> Result<bool, AppError> {
  if provided_password.is_empty() {
    return Ok(false);
  }

  let parsed_hash = PasswordHash::new(stored_hash).map_err(|parse_err| {
    error!(error = %parse_err, "Stored password hash is not a valid PHC string.");
    AppError::Internal(format!("Invalid stored password hash: {}", parse_err))
  })?;

  match Argon2::default().verify_password(provided_password.as_bytes(), &parsed_hash) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => {
      debug!("Password mismatch.");
      Ok(false)
    }
    Err(other) => {
      error!(error = %other, "Argon2 password verification failed.");
      Err(AppError::Internal(format!("Password verification failed: {}", other)))
    }
  }
}
