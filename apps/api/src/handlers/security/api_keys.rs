use super::*;

pub async fn create_api_key_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Extension(claims): Extension<TokenClaims>,
    Json(payload): Json<CreateApiKeyRequest>,
) -> ApiResult<(StatusCode, Json<CreatedApiKeyResponse>)> {
    state
        .access_guard
        .require_permission(&context, &claims, Permission::SecurityApiKeyManage)
        .await?;

    let environment = ApiKeyEnvironment::from_str(&payload.environment)?;
    let generated = state
        .api_key_authority
        .create(
            context.tenant_id(),
            NewApiKey {
                name: payload.name,
                environment,
                scopes: payload.scopes.into_iter().collect(),
                rate_limit_per_hour: payload.rate_limit_per_hour,
                rate_limit_per_day: payload.rate_limit_per_day,
                expires_at: payload.expires_at,
            },
        )
        .await?;

    audit_key_event(
        &state,
        &context,
        AuditAction::ApiKeyCreated,
        generated.key.id,
        &format!("created api key '{}'", generated.key.name),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(CreatedApiKeyResponse::from(generated)),
    ))
}

pub async fn list_api_keys_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Extension(claims): Extension<TokenClaims>,
) -> ApiResult<Json<Vec<ApiKeyResponse>>> {
    state
        .access_guard
        .require_permission(&context, &claims, Permission::SecurityApiKeyManage)
        .await?;

    let keys = state
        .api_key_authority
        .list(context.tenant_id())
        .await?
        .into_iter()
        .map(ApiKeyResponse::from)
        .collect();

    Ok(Json(keys))
}

pub async fn revoke_api_key_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .access_guard
        .require_permission(&context, &claims, Permission::SecurityApiKeyManage)
        .await?;

    let id = ApiKeyId::from_uuid(id);
    state
        .api_key_authority
        .revoke(context.tenant_id(), id)
        .await?;

    audit_key_event(
        &state,
        &context,
        AuditAction::ApiKeyRevoked,
        id,
        "revoked api key",
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

async fn audit_key_event(
    state: &AppState,
    context: &AuthContext,
    action: AuditAction,
    key_id: ApiKeyId,
    description: &str,
) {
    let mut builder = AuditLogEntry::builder()
        .tenant_id(context.tenant_id())
        .actor_id(context.principal().actor_id())
        .actor_name(context.principal().actor_label())
        .action(action)
        .entity_type("api_key")
        .entity_id(key_id.as_uuid().to_string())
        .description(description)
        .result(AuditResult::Success)
        .risk_level(RiskLevel::Medium);
    if let Some(email) = context.principal().actor_email() {
        builder = builder.actor_email(email);
    }

    match builder.build() {
        Ok(entry) => state.audit_trail.record(entry).await,
        Err(error) => {
            tracing::error!(%error, "failed to build api key audit entry");
        }
    }
}
