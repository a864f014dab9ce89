//! Password hashing and verification using Argon2id

use crate::error::AppError;
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

/// Password hasher with configurable parameters
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Create hasher with default parameters (m=64MiB, t=3, p=4)
    pub fn new() -> Self {
        Self::with_params(Params::new(65536, 3, 4, None).unwrap_or_default())
    }

    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Hash a password
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                AppError::Internal(format!("Failed to hash password: {}", e))
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a stored hash.
    ///
    /// A stored value that is not a PHC hash string counts as a mismatch.
    pub fn verify(&self, password: &str, hash: &str) -> Result<(), AppError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| {
            tracing::warn!("Stored password is not a valid hash: {:?}", e);
            AppError::Unauthorized
        })?;

        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AppError::Unauthorized)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> PasswordHasher {
        PasswordHasher::with_params(Params::new(1024, 1, 1, None).unwrap())
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = fast_hasher();
        let hash = hasher.hash("Meter2024!").unwrap();
        hasher.verify("Meter2024!", &hash).unwrap();
    }

    #[test]
    fn test_verify_fails_with_wrong_password() {
        let hasher = fast_hasher();
        let hash = hasher.hash("Meter2024!").unwrap();
        assert!(hasher.verify("meter2024!", &hash).is_err());
    }

    #[test]
    fn test_verify_rejects_plain_stored_value() {
        let hasher = fast_hasher();
        assert!(matches!(hasher.verify("secret", "secret"), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_default_params_verify_fast_hash() {
        // the PHC string carries its own parameters
        let hash = fast_hasher().hash("Meter2024!").unwrap();
        PasswordHasher::new().verify("Meter2024!", &hash).unwrap();
    }
}
