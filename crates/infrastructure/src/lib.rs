//! Infrastructure adapters for the Lykos trust and access layer.
//!
//! Implements the application-layer ports against PostgreSQL, Redis, and
//! Argon2id, plus in-memory variants used by tests and single-instance
//! deployments.

#![forbid(unsafe_code)]

mod argon2_credential_hasher;
mod in_memory_api_key_repository;
mod in_memory_audit_log_repository;
mod in_memory_token_blacklist;
mod postgres_api_key_repository;
mod postgres_audit_log_repository;
mod postgres_employee_repository;
mod postgres_group_repository;
mod redis_token_blacklist;

pub use argon2_credential_hasher::Argon2CredentialHasher;
pub use in_memory_api_key_repository::InMemoryApiKeyRepository;
pub use in_memory_audit_log_repository::InMemoryAuditLogRepository;
pub use in_memory_token_blacklist::InMemoryTokenBlacklist;
pub use postgres_api_key_repository::PostgresApiKeyRepository;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_employee_repository::PostgresEmployeeRepository;
pub use postgres_group_repository::PostgresGroupRepository;
pub use redis_token_blacklist::RedisTokenBlacklist;
