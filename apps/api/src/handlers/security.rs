//! Security administration handlers: groups, API keys, audit, analytics.
//!
//! Every handler runs behind the bearer-token middleware and checks its own
//! permission through the [`lykos_application::AccessGuard`], so a denied
//! call is both refused and audited.

use std::collections::BTreeSet;
use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use lykos_application::{AuditLogQuery, NewApiKey};
use lykos_core::AuthContext;
use lykos_domain::{
    ApiKeyEnvironment, ApiKeyId, AuditAction, AuditLogEntry, AuditResult, EmployeeId, GroupId,
    Permission, RiskLevel, TokenClaims,
};

use crate::dto::{
    ApiKeyResponse, AuditLogEntryResponse, ComplianceReportResponse, CreateApiKeyRequest,
    CreateGroupRequest, CreatedApiKeyResponse, GroupMembershipRequest, GroupResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

mod api_keys;
mod audit;
mod groups;

pub use api_keys::{create_api_key_handler, list_api_keys_handler, revoke_api_key_handler};
pub use audit::{compliance_report_handler, list_audit_log_handler};
pub use groups::{
    assign_group_handler, create_group_handler, delete_group_handler, list_groups_handler,
    unassign_group_handler,
};
