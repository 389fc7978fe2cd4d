use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use lykos_core::{AppError, AuthContext, Principal, TenantId};
use lykos_domain::{RequestMetadata, TokenType};

use crate::error::ApiResult;
use crate::state::AppState;

/// Header conveying the tenant for integration calls, where no token claim
/// carries it.
const TENANT_HEADER: &str = "x-tenant-id";

/// Resolves the employee behind a bearer access token.
///
/// On success the request gains an [`AuthContext`] and the validated
/// [`lykos_domain::TokenClaims`] as extensions. Every failure collapses into
/// the same opaque 401.
pub async fn require_employee_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = bearer_token(request.headers()).ok_or_else(unauthenticated)?;
    let claims = state
        .token_authority
        .validate(&token, TokenType::Access)
        .await?;

    let tenant_id = claims.tenant_id()?;
    let employee_id = claims.employee_id()?;
    let principal = Principal::Employee {
        id: employee_id.as_uuid(),
        email: claims.email.clone().unwrap_or_default(),
        display_name: claims.name.clone().unwrap_or_default(),
    };

    request
        .extensions_mut()
        .insert(AuthContext::new(tenant_id, principal));
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Resolves the integration behind an API key secret.
///
/// Expects the tenant in the `x-tenant-id` header and the secret as a bearer
/// credential. On success the request gains an [`AuthContext`] and the
/// validated [`lykos_domain::ApiKey`] as extensions. Unknown tenant, unknown
/// secret, revoked or expired key all collapse into the same opaque 401.
pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let tenant_id = tenant_header(request.headers()).ok_or_else(unauthenticated)?;
    let secret = bearer_token(request.headers()).ok_or_else(unauthenticated)?;

    let key = state
        .api_key_authority
        .validate(tenant_id, &secret)
        .await?
        .ok_or_else(unauthenticated)?;

    let principal = Principal::ApiKey {
        id: key.id.as_uuid(),
        key_prefix: key.key_prefix.clone(),
    };

    request
        .extensions_mut()
        .insert(AuthContext::new(tenant_id, principal));
    request.extensions_mut().insert(key);
    Ok(next.run(request).await)
}

/// Pulls request metadata out of the headers for audit attribution.
pub fn request_metadata(headers: &HeaderMap) -> RequestMetadata {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    RequestMetadata {
        ip_address,
        user_agent,
        session_id: None,
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn tenant_header(headers: &HeaderMap) -> Option<TenantId> {
    headers
        .get(TENANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .map(TenantId::from_uuid)
}

fn unauthenticated() -> AppError {
    AppError::Unauthenticated("authentication required".to_owned())
}
