use super::*;

#[derive(Debug, serde::Deserialize)]
pub struct AuditLogParams {
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub min_risk_level: Option<String>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, serde::Deserialize)]
pub struct ReportRangeParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub async fn list_audit_log_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Extension(claims): Extension<TokenClaims>,
    Query(params): Query<AuditLogParams>,
) -> ApiResult<Json<Vec<AuditLogEntryResponse>>> {
    state
        .access_guard
        .require_permission(&context, &claims, Permission::SecurityAuditRead)
        .await?;

    let action = params
        .action
        .as_deref()
        .map(AuditAction::from_str)
        .transpose()?;
    let min_risk_level = params
        .min_risk_level
        .as_deref()
        .map(RiskLevel::from_str)
        .transpose()?;

    let entries = state
        .audit_trail
        .query(
            context.tenant_id(),
            &AuditLogQuery {
                actor_id: params.actor_id,
                action,
                entity_type: params.entity_type,
                min_risk_level,
                occurred_after: params.occurred_after,
                occurred_before: params.occurred_before,
                limit: params.limit,
                offset: params.offset,
            },
        )
        .await?
        .into_iter()
        .map(AuditLogEntryResponse::from)
        .collect();

    Ok(Json(entries))
}

pub async fn compliance_report_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Extension(claims): Extension<TokenClaims>,
    Query(params): Query<ReportRangeParams>,
) -> ApiResult<Json<ComplianceReportResponse>> {
    state
        .access_guard
        .require_permission(&context, &claims, Permission::SecurityAuditRead)
        .await?;

    let report = state
        .security_analytics
        .compliance_report(context.tenant_id(), params.start, params.end)
        .await?;

    Ok(Json(ComplianceReportResponse::from(report)))
}
