//! Handlers behind the API-key middleware on the `/integrations` prefix.

use axum::Json;
use axum::extract::Extension;

use lykos_core::AuthContext;
use lykos_domain::ApiKey;

use crate::dto::IntegrationIdentityResponse;
use crate::error::ApiResult;

/// Echoes the resolved integration identity so callers can verify their
/// credential and see its granted scopes.
pub async fn whoami_handler(
    Extension(context): Extension<AuthContext>,
    Extension(key): Extension<ApiKey>,
) -> ApiResult<Json<IntegrationIdentityResponse>> {
    Ok(Json(IntegrationIdentityResponse {
        tenant_id: context.tenant_id().as_uuid(),
        key_id: key.id.as_uuid(),
        key_prefix: key.key_prefix,
        scopes: key.scopes.into_iter().collect(),
    }))
}
