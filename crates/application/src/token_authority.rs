//! Issuance, validation, and revocation of typed signed tokens.
//!
//! Tokens are self-verifying (HS256 signature plus expiry), so revocation
//! needs server-side state: a blacklist of token digests consulted before any
//! signature or expiry check. An entry outlives the token it shadows, making
//! revocation effective immediately and permanently.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use lykos_core::{AppError, AppResult, TenantId};
use lykos_domain::{Employee, TokenClaims, TokenType};
use uuid::Uuid;

/// Tolerance window for clock skew between issuer and validator.
///
/// Tokens whose `iat` sits up to this many seconds in the future are still
/// accepted; expiry checks get the same leeway.
pub const CLOCK_SKEW_LEEWAY_SECONDS: u64 = 60;

/// Minimum accepted signing secret length in bytes.
const MIN_SECRET_BYTES: usize = 32;

/// Port for the shared token revocation set.
///
/// Membership test and insert must be globally consistent across all
/// concurrent callers; implementations are internally synchronized or backed
/// by a shared store.
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Adds a token digest. Membership must last at least `ttl`.
    ///
    /// Inserting an already-present digest is a no-op, making revocation
    /// idempotent.
    async fn insert(&self, digest: &str, ttl: chrono::Duration) -> AppResult<()>;

    /// Tests digest membership.
    async fn contains(&self, digest: &str) -> AppResult<bool>;
}

/// A freshly issued token together with its identity and expiry.
#[derive(Debug, Clone)]
pub struct SignedToken {
    /// The raw signed token, returned to the caller exactly once.
    pub token: String,
    /// The `jti` claim.
    pub token_id: Uuid,
    /// Natural expiry timestamp.
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates typed, signed, time-boxed tokens.
#[derive(Clone)]
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    blacklist: Arc<dyn TokenBlacklist>,
}

impl TokenAuthority {
    /// Creates an authority from a signing secret and a revocation set.
    pub fn new(secret: &[u8], blacklist: Arc<dyn TokenBlacklist>) -> AppResult<Self> {
        if secret.len() < MIN_SECRET_BYTES {
            return Err(AppError::Validation(format!(
                "token signing secret must be at least {MIN_SECRET_BYTES} bytes"
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            blacklist,
        })
    }

    /// Issues a token of the given type with its default lifetime.
    ///
    /// Access tokens embed the employee's current permission and group
    /// snapshot; all other types carry identity only. The snapshot is stale
    /// the moment group membership changes and stays stale until the token
    /// expires or is revoked.
    pub fn issue(
        &self,
        employee: &Employee,
        tenant_id: TenantId,
        token_type: TokenType,
    ) -> AppResult<SignedToken> {
        self.issue_with_ttl(employee, tenant_id, token_type, token_type.ttl())
    }

    fn issue_with_ttl(
        &self,
        employee: &Employee,
        tenant_id: TenantId,
        token_type: TokenType,
        ttl: chrono::Duration,
    ) -> AppResult<SignedToken> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let token_id = Uuid::new_v4();

        let (name, email, permissions, groups) = match token_type {
            TokenType::Access => (
                Some(employee.display_name.clone()),
                Some(employee.email.as_str().to_owned()),
                Some(
                    employee
                        .effective_permissions()
                        .iter()
                        .map(|permission| permission.as_str().to_owned())
                        .collect(),
                ),
                Some(
                    employee
                        .groups
                        .iter()
                        .map(|group| group.name.clone())
                        .collect(),
                ),
            ),
            TokenType::Refresh | TokenType::PasswordReset | TokenType::PasswordChange => {
                (None, None, None, None)
            }
        };

        let claims = TokenClaims {
            sub: employee.id.to_string(),
            tenant: tenant_id.to_string(),
            typ: token_type.as_str().to_owned(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: token_id.to_string(),
            name,
            email,
            permissions,
            groups,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|error| AppError::Internal(format!("failed to sign token: {error}")))?;

        Ok(SignedToken {
            token,
            token_id,
            expires_at,
        })
    }

    /// Validates a token against an expected type.
    ///
    /// Rejection order: blacklist membership, signature/structure/expiry,
    /// declared type. Every rejection collapses to one opaque
    /// `Unauthenticated` error; the distinct reason is logged at debug level
    /// only, so callers cannot be used as an oracle.
    pub async fn validate(&self, raw: &str, expected: TokenType) -> AppResult<TokenClaims> {
        let digest = token_digest(raw);
        if self.blacklist.contains(digest.as_str()).await? {
            tracing::debug!(expected = expected.as_str(), "rejected revoked token");
            return Err(unauthenticated());
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY_SECONDS;

        let token_data =
            decode::<TokenClaims>(raw, &self.decoding_key, &validation).map_err(|error| {
                tracing::debug!(
                    reason = %error,
                    expected = expected.as_str(),
                    "rejected undecodable token"
                );
                unauthenticated()
            })?;

        let claims = token_data.claims;
        if claims.typ != expected.as_str() {
            tracing::debug!(
                declared = %claims.typ,
                expected = expected.as_str(),
                "rejected token type mismatch"
            );
            return Err(unauthenticated());
        }

        Ok(claims)
    }

    /// Revokes a token for the remainder of its natural life.
    ///
    /// Idempotent: revoking twice observes the same outcome as once. The
    /// digest is blacklisted even when the token cannot be decoded, with the
    /// longest token lifetime as the fallback TTL.
    pub async fn revoke(&self, raw: &str) -> AppResult<()> {
        let digest = token_digest(raw);
        let ttl = self
            .decode_expiry(raw)
            .map(|expires_at| expires_at - Utc::now())
            .filter(|remaining| *remaining > chrono::Duration::zero())
            .unwrap_or_else(|| TokenType::Refresh.ttl());

        self.blacklist.insert(digest.as_str(), ttl).await
    }

    /// Decodes claims with the signature enforced but expiry ignored.
    ///
    /// Used for revocation TTLs and for attributing a just-revoked token in
    /// the audit trail. Never a substitute for `validate`.
    pub(crate) fn decode_claims_lossy(&self, raw: &str) -> Option<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY_SECONDS;
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<TokenClaims>(raw, &self.decoding_key, &validation)
            .ok()
            .map(|data| data.claims)
    }

    /// Decodes the expiry claim without enforcing it, for revocation TTLs.
    fn decode_expiry(&self, raw: &str) -> Option<DateTime<Utc>> {
        self.decode_claims_lossy(raw)
            .and_then(|claims| Utc.timestamp_opt(claims.exp, 0).single())
    }
}

/// Computes the SHA-256 hex digest of a raw token for blacklist storage.
///
/// Storing digests rather than raw tokens keeps usable credentials out of
/// the blacklist store.
fn token_digest(raw: &str) -> String {
    use sha2::{Digest, Sha256};

    hex::encode(Sha256::digest(raw.as_bytes()))
}

fn unauthenticated() -> AppError {
    AppError::Unauthenticated("invalid token".to_owned())
}
