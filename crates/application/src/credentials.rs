use lykos_core::AppResult;

/// Port for one-way, salted secret hashing.
///
/// Implementations use a deliberately slow algorithm (Argon2id-class work
/// factor). Plaintext secrets are never logged, persisted, or returned after
/// the issuing call. `verify_password` is fail-closed: a malformed digest
/// yields `Ok(false)`, never an error the caller could misread as success.
pub trait PasswordHasher: Send + Sync {
    /// Produces a salted digest of the secret.
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verifies a secret against a stored digest.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;
}
