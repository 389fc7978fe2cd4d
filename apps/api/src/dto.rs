use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lykos_application::{
    ActionFailureRate, ActionFrequency, ActorActivity, AnomalyFinding, AnomalySubject,
    ComplianceReport, GeneratedApiKey, SessionTokens,
};
use lykos_domain::{ApiKey, AuditLogEntry, Employee, Group, Permission};

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Incoming payload for employee login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub tenant_id: Uuid,
    pub email: String,
    pub password: String,
}

/// Incoming payload for a session refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Incoming payload for logout.
#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub access_token: String,
    pub refresh_token: String,
}

/// Incoming payload for the forgot-password flow.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub tenant_id: Uuid,
    pub email: String,
}

/// Incoming payload completing a password reset.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub reset_token: String,
    pub new_password: String,
}

/// Incoming payload for an authenticated password change.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Incoming payload for group creation.
#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub permissions: Vec<String>,
}

/// Incoming payload for group assignment and unassignment.
#[derive(Debug, Deserialize)]
pub struct GroupMembershipRequest {
    pub group_id: Uuid,
    pub employee_id: Uuid,
}

/// Incoming payload for API key creation.
#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
    pub environment: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub rate_limit_per_hour: i32,
    pub rate_limit_per_day: i32,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// API representation of an authenticated employee.
#[derive(Debug, Serialize)]
pub struct EmployeeResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub status: String,
    pub permissions: Vec<String>,
    pub groups: Vec<String>,
}

impl From<&Employee> for EmployeeResponse {
    fn from(employee: &Employee) -> Self {
        Self {
            id: employee.id.as_uuid(),
            email: employee.email.as_str().to_owned(),
            display_name: employee.display_name.clone(),
            status: employee.status.as_str().to_owned(),
            permissions: employee
                .effective_permissions()
                .iter()
                .map(|permission| permission.as_str().to_owned())
                .collect(),
            groups: employee
                .groups
                .iter()
                .map(|group| group.name.clone())
                .collect(),
        }
    }
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

impl From<&SessionTokens> for TokenPairResponse {
    fn from(tokens: &SessionTokens) -> Self {
        Self {
            access_token: tokens.access.token.clone(),
            access_expires_at: tokens.access.expires_at,
            refresh_token: tokens.refresh.token.clone(),
            refresh_expires_at: tokens.refresh.expires_at,
        }
    }
}

/// Successful login payload.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub employee: EmployeeResponse,
    pub tokens: TokenPairResponse,
}

/// API representation of a permission group.
#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub id: Uuid,
    pub name: String,
    pub permissions: Vec<String>,
    pub is_system: bool,
}

impl From<Group> for GroupResponse {
    fn from(group: Group) -> Self {
        Self {
            id: group.id.as_uuid(),
            name: group.name,
            permissions: group
                .permissions
                .iter()
                .map(Permission::as_str)
                .map(str::to_owned)
                .collect(),
            is_system: group.is_system,
        }
    }
}

/// API representation of an API key record. Never carries the secret.
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub name: String,
    pub key_prefix: String,
    pub environment: String,
    pub scopes: Vec<String>,
    pub status: String,
    pub rate_limit_per_hour: i32,
    pub rate_limit_per_day: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub total_requests: i64,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id.as_uuid(),
            name: key.name,
            key_prefix: key.key_prefix,
            environment: key.environment.as_str().to_owned(),
            scopes: key.scopes.into_iter().collect(),
            status: key.status.as_str().to_owned(),
            rate_limit_per_hour: key.rate_limit_per_hour,
            rate_limit_per_day: key.rate_limit_per_day,
            expires_at: key.expires_at,
            last_used_at: key.last_used_at,
            total_requests: key.total_requests,
            created_at: key.created_at,
        }
    }
}

/// Creation payload: the record plus the secret, shown exactly once.
#[derive(Debug, Serialize)]
pub struct CreatedApiKeyResponse {
    pub secret: String,
    pub key: ApiKeyResponse,
}

impl From<GeneratedApiKey> for CreatedApiKeyResponse {
    fn from(generated: GeneratedApiKey) -> Self {
        Self {
            secret: generated.secret,
            key: ApiKeyResponse::from(generated.key),
        }
    }
}

/// API representation of one audit log entry.
#[derive(Debug, Serialize)]
pub struct AuditLogEntryResponse {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub actor_email: Option<String>,
    pub actor_name: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub risk_level: String,
    pub result: String,
    pub error_message: Option<String>,
    pub duration_ms: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

impl From<AuditLogEntry> for AuditLogEntryResponse {
    fn from(entry: AuditLogEntry) -> Self {
        Self {
            id: entry.id,
            actor_id: entry.actor_id,
            actor_email: entry.actor_email,
            actor_name: entry.actor_name,
            action: entry.action.as_str().to_owned(),
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            description: entry.description,
            ip_address: entry.metadata.ip_address,
            user_agent: entry.metadata.user_agent,
            session_id: entry.metadata.session_id,
            risk_level: entry.risk_level.as_str().to_owned(),
            result: entry.result.as_str().to_owned(),
            error_message: entry.error_message,
            duration_ms: entry.duration_ms,
            occurred_at: entry.occurred_at,
        }
    }
}

/// One action's occurrence count.
#[derive(Debug, Serialize)]
pub struct ActionFrequencyResponse {
    pub action: String,
    pub count: usize,
}

impl From<ActionFrequency> for ActionFrequencyResponse {
    fn from(frequency: ActionFrequency) -> Self {
        Self {
            action: frequency.action.as_str().to_owned(),
            count: frequency.count,
        }
    }
}

/// One actor's activity total.
#[derive(Debug, Serialize)]
pub struct ActorActivityResponse {
    pub actor_id: Uuid,
    pub actor_name: String,
    pub entry_count: usize,
}

impl From<ActorActivity> for ActorActivityResponse {
    fn from(activity: ActorActivity) -> Self {
        Self {
            actor_id: activity.actor_id,
            actor_name: activity.actor_name,
            entry_count: activity.entry_count,
        }
    }
}

/// Failure share for one action.
#[derive(Debug, Serialize)]
pub struct ActionFailureRateResponse {
    pub action: String,
    pub total: usize,
    pub failures: usize,
    pub failure_rate: f64,
}

impl From<ActionFailureRate> for ActionFailureRateResponse {
    fn from(rate: ActionFailureRate) -> Self {
        Self {
            action: rate.action.as_str().to_owned(),
            total: rate.total,
            failures: rate.failures,
            failure_rate: rate.failure_rate,
        }
    }
}

/// One flagged IP or actor.
#[derive(Debug, Serialize)]
pub struct AnomalyFindingResponse {
    pub subject_kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_name: Option<String>,
    pub high_severity_count: usize,
}

impl From<AnomalyFinding> for AnomalyFindingResponse {
    fn from(finding: AnomalyFinding) -> Self {
        match finding.subject {
            AnomalySubject::IpAddress(ip_address) => Self {
                subject_kind: "ip_address",
                ip_address: Some(ip_address),
                actor_id: None,
                actor_name: None,
                high_severity_count: finding.high_severity_count,
            },
            AnomalySubject::Actor {
                actor_id,
                actor_name,
            } => Self {
                subject_kind: "actor",
                ip_address: None,
                actor_id: Some(actor_id),
                actor_name: Some(actor_name),
                high_severity_count: finding.high_severity_count,
            },
        }
    }
}

/// Aggregated audit activity for a time range.
#[derive(Debug, Serialize)]
pub struct ComplianceReportResponse {
    pub tenant_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_entries: usize,
    pub action_frequencies: Vec<ActionFrequencyResponse>,
    pub top_actors: Vec<ActorActivityResponse>,
    pub hourly_distribution: [usize; 24],
    pub risk_distribution: BTreeMap<String, usize>,
    pub failure_rates: Vec<ActionFailureRateResponse>,
    pub anomalies: Vec<AnomalyFindingResponse>,
}

impl From<ComplianceReport> for ComplianceReportResponse {
    fn from(report: ComplianceReport) -> Self {
        Self {
            tenant_id: report.tenant_id.as_uuid(),
            start: report.start,
            end: report.end,
            total_entries: report.total_entries,
            action_frequencies: report
                .action_frequencies
                .into_iter()
                .map(ActionFrequencyResponse::from)
                .collect(),
            top_actors: report
                .top_actors
                .into_iter()
                .map(ActorActivityResponse::from)
                .collect(),
            hourly_distribution: report.hourly_distribution,
            risk_distribution: report
                .risk_distribution
                .into_iter()
                .map(|(level, count)| (level.as_str().to_owned(), count))
                .collect(),
            failure_rates: report
                .failure_rates
                .into_iter()
                .map(ActionFailureRateResponse::from)
                .collect(),
            anomalies: report
                .anomalies
                .into_iter()
                .map(AnomalyFindingResponse::from)
                .collect(),
        }
    }
}

/// Identity echo for an authenticated integration caller.
#[derive(Debug, Serialize)]
pub struct IntegrationIdentityResponse {
    pub tenant_id: Uuid,
    pub key_id: Uuid,
    pub key_prefix: String,
    pub scopes: Vec<String>,
}
