//! Authentication and password handlers.

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode};

use lykos_application::AuthOutcome;
use lykos_core::{AppError, AuthContext, Principal, TenantId};
use lykos_domain::EmployeeId;

use crate::dto::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LoginResponse, LogoutRequest,
    RefreshRequest, ResetPasswordRequest, TokenPairResponse,
};
use crate::error::ApiResult;
use crate::middleware::request_metadata;
use crate::state::AppState;

pub async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let outcome = state
        .employee_auth_service
        .login(
            TenantId::from_uuid(payload.tenant_id),
            &payload.email,
            &payload.password,
            request_metadata(&headers),
        )
        .await?;

    match outcome {
        AuthOutcome::Authenticated { employee, tokens } => Ok(Json(LoginResponse {
            employee: (&employee).into(),
            tokens: (&tokens).into(),
        })),
        AuthOutcome::Failed => Err(AppError::Unauthenticated(
            "authentication required".to_owned(),
        )
        .into()),
    }
}

pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPairResponse>> {
    let tokens = state
        .employee_auth_service
        .refresh(&payload.refresh_token)
        .await?;

    Ok(Json(TokenPairResponse::from(&tokens)))
}

pub async fn logout_handler(
    State(state): State<AppState>,
    Json(payload): Json<LogoutRequest>,
) -> ApiResult<StatusCode> {
    state
        .employee_auth_service
        .logout(&payload.access_token, &payload.refresh_token)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Starts a password reset. Responds 202 whether or not the email exists;
/// token delivery happens out of band.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ForgotPasswordRequest>,
) -> ApiResult<StatusCode> {
    let issued = state
        .employee_auth_service
        .request_password_reset(
            TenantId::from_uuid(payload.tenant_id),
            &payload.email,
            request_metadata(&headers),
        )
        .await?;

    if let Some(reset) = issued {
        // Delivery is the operator's concern; only the token id is logged.
        tracing::info!(token_id = %reset.token_id, "password reset token issued");
    }

    Ok(StatusCode::ACCEPTED)
}

pub async fn reset_password_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<StatusCode> {
    state
        .employee_auth_service
        .reset_password(
            &payload.reset_token,
            &payload.new_password,
            request_metadata(&headers),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    headers: HeaderMap,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    let id = match context.principal() {
        Principal::Employee { id, .. } => *id,
        Principal::ApiKey { .. } => {
            return Err(AppError::Forbidden("employee credential required".to_owned()).into());
        }
    };

    state
        .employee_auth_service
        .change_password(
            context.tenant_id(),
            EmployeeId::from_uuid(id),
            &payload.current_password,
            &payload.new_password,
            request_metadata(&headers),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
