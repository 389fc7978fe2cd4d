//! Lykos HTTP API composition root.
//!
//! Reads configuration from the environment, wires the Postgres and Redis
//! adapters into the application services, and serves the axum router until
//! SIGINT or SIGTERM. The audit trail is flushed before exit.

mod auth;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use lykos_application::{
    AccessGuard, ApiKeyAuthority, AuditTrail, AuditTrailConfig, EmployeeAuthService,
    SecurityAdminService, SecurityAnalytics, TokenAuthority, TokenBlacklist,
};
use lykos_core::{AppError, TenantId};
use lykos_infrastructure::{
    Argon2CredentialHasher, InMemoryTokenBlacklist, PostgresApiKeyRepository,
    PostgresAuditLogRepository, PostgresEmployeeRepository, PostgresGroupRepository,
    RedisTokenBlacklist,
};

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

    let database_url = required_non_empty_env("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to postgres: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if migrate_only {
        info!("migrations applied, exiting");
        return Ok(());
    }

    let token_secret = required_non_empty_env("TOKEN_SECRET")?;
    let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
    let api_port = env::var("API_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let blacklist: Arc<dyn TokenBlacklist> = match env::var("REDIS_URL") {
        Ok(url) if !url.trim().is_empty() => {
            let client = redis::Client::open(url.as_str())
                .map_err(|error| AppError::Internal(format!("invalid REDIS_URL: {error}")))?;
            Arc::new(RedisTokenBlacklist::new(client, "lykos:blacklist"))
        }
        _ => {
            // Fine for a single instance; revocations will not propagate
            // across replicas.
            warn!("REDIS_URL not set, falling back to the in-memory token blacklist");
            Arc::new(InMemoryTokenBlacklist::new())
        }
    };

    let employee_repository = Arc::new(PostgresEmployeeRepository::new(pool.clone()));
    let group_repository = Arc::new(PostgresGroupRepository::new(pool.clone()));
    let api_key_repository = Arc::new(PostgresApiKeyRepository::new(pool.clone()));
    let audit_repository = Arc::new(PostgresAuditLogRepository::new(pool.clone()));

    if let Some(tenant_id) = optional_tenant_env("BOOTSTRAP_TENANT_ID")? {
        group_repository.ensure_system_groups(tenant_id).await?;
        info!(%tenant_id, "system groups ensured for bootstrap tenant");
    }

    let audit_trail = AuditTrail::spawn(audit_repository.clone(), AuditTrailConfig::default());
    let token_authority = TokenAuthority::new(token_secret.as_bytes(), blacklist)?;

    let app_state = AppState {
        employee_auth_service: EmployeeAuthService::new(
            employee_repository,
            Arc::new(Argon2CredentialHasher::new()),
            token_authority.clone(),
            audit_trail.clone(),
        ),
        security_admin_service: SecurityAdminService::new(group_repository, audit_trail.clone()),
        api_key_authority: ApiKeyAuthority::new(api_key_repository),
        access_guard: AccessGuard::new(audit_trail.clone()),
        security_analytics: SecurityAnalytics::new(audit_repository),
        token_authority,
        audit_trail: audit_trail.clone(),
    };

    let protected_routes = Router::new()
        .route("/api/profile/password", put(auth::change_password_handler))
        .route(
            "/api/security/groups",
            get(handlers::security::list_groups_handler)
                .post(handlers::security::create_group_handler),
        )
        .route(
            "/api/security/groups/{id}",
            delete(handlers::security::delete_group_handler),
        )
        .route(
            "/api/security/group-assignments",
            post(handlers::security::assign_group_handler),
        )
        .route(
            "/api/security/group-unassignments",
            post(handlers::security::unassign_group_handler),
        )
        .route(
            "/api/security/api-keys",
            get(handlers::security::list_api_keys_handler)
                .post(handlers::security::create_api_key_handler),
        )
        .route(
            "/api/security/api-keys/{id}",
            delete(handlers::security::revoke_api_key_handler),
        )
        .route(
            "/api/security/audit-log",
            get(handlers::security::list_audit_log_handler),
        )
        .route(
            "/api/security/compliance-report",
            get(handlers::security::compliance_report_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_employee_auth,
        ));

    let integration_routes = Router::new()
        .route(
            "/integrations/whoami",
            get(handlers::integrations::whoami_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_api_key,
        ));

    let app = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/forgot-password", post(auth::forgot_password_handler))
        .route("/auth/reset-password", post(auth::reset_password_handler))
        .merge(protected_routes)
        .merge(integration_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let host = IpAddr::from_str(&api_host)
        .map_err(|error| AppError::Internal(format!("invalid API_HOST '{api_host}': {error}")))?;
    let address = SocketAddr::from((host, api_port));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "lykos-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))?;

    info!("flushing audit trail");
    if !audit_trail.shutdown().await {
        warn!("audit trail did not drain within the grace period");
    }

    Ok(())
}

/// Resolves when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let interrupt = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = interrupt => {},
        () = terminate => {},
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn optional_tenant_env(name: &str) -> Result<Option<TenantId>, AppError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(|value| {
            Uuid::parse_str(value.trim())
                .map(TenantId::from_uuid)
                .map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))
        })
        .transpose()
}
