//! Argon2id credential hasher.
//!
//! Uses OWASP-recommended Argon2id parameters: m=19456 (19 MiB), t=2, p=1.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use lykos_application::PasswordHasher as PasswordHasherPort;
use lykos_core::{AppError, AppResult};

/// Argon2id credential hasher with OWASP-recommended parameters.
#[derive(Clone)]
pub struct Argon2CredentialHasher {
    argon2: Argon2<'static>,
}

impl Argon2CredentialHasher {
    /// Creates a new Argon2id hasher with recommended parameters.
    #[must_use]
    pub fn new() -> Self {
        // OWASP Password Storage: Argon2id with m=19456, t=2, p=1.
        let params = Params::new(19456, 2, 1, None).unwrap_or_else(|_| Params::default());

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        Self { argon2 }
    }
}

impl Default for Argon2CredentialHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasherPort for Argon2CredentialHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);

        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|error| AppError::Internal(format!("failed to hash password: {error}")))?;

        Ok(hash.to_string())
    }

    /// Fail-closed verification: a stored digest that cannot be parsed
    /// rejects the password rather than erroring, so a corrupted hash column
    /// can never be mistaken for a match.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(error) => {
                tracing::warn!(%error, "stored password hash is malformed, rejecting");
                return Ok(false);
            }
        };

        match self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
        {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(error) => {
                tracing::warn!(%error, "password verification failed structurally, rejecting");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lykos_application::PasswordHasher as PasswordHasherPort;
    use lykos_core::AppResult;

    #[test]
    fn hash_and_verify_correct_password() -> AppResult<()> {
        let hasher = Argon2CredentialHasher::new();
        let hash = hasher.hash_password("my-secret-password")?;
        assert!(hasher.verify_password("my-secret-password", &hash)?);
        Ok(())
    }

    #[test]
    fn verify_wrong_password_returns_false() -> AppResult<()> {
        let hasher = Argon2CredentialHasher::new();
        let hash = hasher.hash_password("correct-password")?;
        assert!(!hasher.verify_password("wrong-password", &hash)?);
        Ok(())
    }

    #[test]
    fn malformed_digest_rejects_instead_of_erroring() -> AppResult<()> {
        let hasher = Argon2CredentialHasher::new();
        assert!(!hasher.verify_password("any-password", "not-an-argon2-digest")?);
        assert!(!hasher.verify_password("any-password", "")?);
        Ok(())
    }

    #[test]
    fn hashes_are_salted() -> AppResult<()> {
        let hasher = Argon2CredentialHasher::new();
        let first = hasher.hash_password("same-password")?;
        let second = hasher.hash_password("same-password")?;
        assert_ne!(first, second);
        Ok(())
    }
}
