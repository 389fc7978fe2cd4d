//! Read-only analytics over the audit log.
//!
//! Every function is a deterministic aggregation of the stored entries for
//! one tenant and one time range; nothing here mutates state. Ranges are
//! half-open: `[start, end)`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use lykos_core::{AppError, AppResult, TenantId};
use lykos_domain::{AuditAction, AuditLogEntry, AuditResult, RiskLevel};
use uuid::Uuid;

use crate::audit_trail::AuditLogRepository;

/// High/Critical entries per source IP before it is flagged.
const ANOMALY_IP_THRESHOLD: usize = 5;

/// High/Critical entries per actor before they are flagged.
const ANOMALY_ACTOR_THRESHOLD: usize = 3;

/// One action's occurrence count within a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFrequency {
    /// The action.
    pub action: AuditAction,
    /// How many entries carried it.
    pub count: usize,
}

/// One actor's activity within a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorActivity {
    /// Actor identifier.
    pub actor_id: Uuid,
    /// Actor display label from the most recent entry.
    pub actor_name: String,
    /// Total entries attributed to the actor.
    pub entry_count: usize,
}

/// Failure share for one action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionFailureRate {
    /// The action.
    pub action: AuditAction,
    /// Total entries for the action.
    pub total: usize,
    /// Entries whose result was Failure or Unauthorized.
    pub failures: usize,
    /// `failures / total` in `[0, 1]`.
    pub failure_rate: f64,
}

/// What an anomaly finding points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnomalySubject {
    /// A source IP address.
    IpAddress(String),
    /// An actor.
    Actor {
        /// Actor identifier.
        actor_id: Uuid,
        /// Actor display label.
        actor_name: String,
    },
}

/// One flagged subject with its high-severity entry count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnomalyFinding {
    /// Who or what was flagged.
    pub subject: AnomalySubject,
    /// High/Critical entries observed in the range.
    pub high_severity_count: usize,
}

/// Aggregated view of a tenant's audit activity over a range.
#[derive(Debug, Clone)]
pub struct ComplianceReport {
    /// Tenant the report covers.
    pub tenant_id: TenantId,
    /// Inclusive range start.
    pub start: DateTime<Utc>,
    /// Exclusive range end.
    pub end: DateTime<Utc>,
    /// Total entries in the range.
    pub total_entries: usize,
    /// Action histogram, most frequent first.
    pub action_frequencies: Vec<ActionFrequency>,
    /// Actor leaderboard, most active first.
    pub top_actors: Vec<ActorActivity>,
    /// Entry counts by hour of day, index 0 = midnight UTC.
    pub hourly_distribution: [usize; 24],
    /// Entry counts by risk level.
    pub risk_distribution: HashMap<RiskLevel, usize>,
    /// Failure rates per action, highest rate first.
    pub failure_rates: Vec<ActionFailureRate>,
    /// Flagged IPs and actors.
    pub anomalies: Vec<AnomalyFinding>,
}

/// Read-only analytics over stored audit entries.
#[derive(Clone)]
pub struct SecurityAnalytics {
    repository: Arc<dyn AuditLogRepository>,
}

impl SecurityAnalytics {
    /// Creates an analytics service over the given log store.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditLogRepository>) -> Self {
        Self { repository }
    }

    /// Action histogram for a range, most frequent first.
    pub async fn action_frequencies(
        &self,
        tenant_id: TenantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<ActionFrequency>> {
        let entries = self.entries(tenant_id, start, end).await?;
        Ok(action_frequencies_of(&entries))
    }

    /// Actor leaderboard for a range, most active first.
    pub async fn top_actors(
        &self,
        tenant_id: TenantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<ActorActivity>> {
        let entries = self.entries(tenant_id, start, end).await?;
        let mut actors = actor_activity_of(&entries);
        actors.truncate(limit);
        Ok(actors)
    }

    /// Entry counts by UTC hour of day for a range.
    pub async fn hourly_distribution(
        &self,
        tenant_id: TenantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<[usize; 24]> {
        let entries = self.entries(tenant_id, start, end).await?;
        Ok(hourly_distribution_of(&entries))
    }

    /// Entry counts by risk level for a range.
    pub async fn risk_distribution(
        &self,
        tenant_id: TenantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<HashMap<RiskLevel, usize>> {
        let entries = self.entries(tenant_id, start, end).await?;
        Ok(risk_distribution_of(&entries))
    }

    /// Failure rate per action for a range, highest rate first.
    pub async fn failure_rates(
        &self,
        tenant_id: TenantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<ActionFailureRate>> {
        let entries = self.entries(tenant_id, start, end).await?;
        Ok(failure_rates_of(&entries))
    }

    /// Flags IPs and actors with unusual high-severity activity.
    ///
    /// An IP is flagged after more than five High/Critical entries in the
    /// range, an actor after more than three.
    pub async fn detect_anomalies(
        &self,
        tenant_id: TenantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<AnomalyFinding>> {
        let entries = self.entries(tenant_id, start, end).await?;
        Ok(anomalies_of(&entries))
    }

    /// Assembles the full report for a range in one pass over the entries.
    pub async fn compliance_report(
        &self,
        tenant_id: TenantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<ComplianceReport> {
        let entries = self.entries(tenant_id, start, end).await?;

        Ok(ComplianceReport {
            tenant_id,
            start,
            end,
            total_entries: entries.len(),
            action_frequencies: action_frequencies_of(&entries),
            top_actors: actor_activity_of(&entries),
            hourly_distribution: hourly_distribution_of(&entries),
            risk_distribution: risk_distribution_of(&entries),
            failure_rates: failure_rates_of(&entries),
            anomalies: anomalies_of(&entries),
        })
    }

    async fn entries(
        &self,
        tenant_id: TenantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<AuditLogEntry>> {
        if start >= end {
            return Err(AppError::Validation(
                "analytics range start must precede end".to_owned(),
            ));
        }
        self.repository.entries_in_range(tenant_id, start, end).await
    }
}

fn action_frequencies_of(entries: &[AuditLogEntry]) -> Vec<ActionFrequency> {
    let mut counts: HashMap<AuditAction, usize> = HashMap::new();
    for entry in entries {
        *counts.entry(entry.action).or_default() += 1;
    }

    let mut frequencies: Vec<ActionFrequency> = counts
        .into_iter()
        .map(|(action, count)| ActionFrequency { action, count })
        .collect();
    frequencies.sort_by(|a, b| b.count.cmp(&a.count).then(a.action.as_str().cmp(b.action.as_str())));
    frequencies
}

fn actor_activity_of(entries: &[AuditLogEntry]) -> Vec<ActorActivity> {
    let mut by_actor: HashMap<Uuid, ActorActivity> = HashMap::new();
    for entry in entries {
        by_actor
            .entry(entry.actor_id)
            .and_modify(|activity| {
                activity.entry_count += 1;
                activity.actor_name = entry.actor_name.clone();
            })
            .or_insert_with(|| ActorActivity {
                actor_id: entry.actor_id,
                actor_name: entry.actor_name.clone(),
                entry_count: 1,
            });
    }

    let mut actors: Vec<ActorActivity> = by_actor.into_values().collect();
    actors.sort_by(|a, b| {
        b.entry_count
            .cmp(&a.entry_count)
            .then(a.actor_id.cmp(&b.actor_id))
    });
    actors
}

fn hourly_distribution_of(entries: &[AuditLogEntry]) -> [usize; 24] {
    let mut buckets = [0usize; 24];
    for entry in entries {
        buckets[entry.occurred_at.hour() as usize] += 1;
    }
    buckets
}

fn risk_distribution_of(entries: &[AuditLogEntry]) -> HashMap<RiskLevel, usize> {
    let mut counts = HashMap::new();
    for entry in entries {
        *counts.entry(entry.risk_level).or_default() += 1;
    }
    counts
}

fn failure_rates_of(entries: &[AuditLogEntry]) -> Vec<ActionFailureRate> {
    let mut totals: HashMap<AuditAction, (usize, usize)> = HashMap::new();
    for entry in entries {
        let (total, failures) = totals.entry(entry.action).or_default();
        *total += 1;
        if matches!(entry.result, AuditResult::Failure | AuditResult::Unauthorized) {
            *failures += 1;
        }
    }

    let mut rates: Vec<ActionFailureRate> = totals
        .into_iter()
        .map(|(action, (total, failures))| ActionFailureRate {
            action,
            total,
            failures,
            // total is never zero here.
            failure_rate: failures as f64 / total as f64,
        })
        .collect();
    rates.sort_by(|a, b| {
        b.failure_rate
            .partial_cmp(&a.failure_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.action.as_str().cmp(b.action.as_str()))
    });
    rates
}

fn anomalies_of(entries: &[AuditLogEntry]) -> Vec<AnomalyFinding> {
    let mut by_ip: HashMap<&str, usize> = HashMap::new();
    let mut by_actor: HashMap<Uuid, (usize, &str)> = HashMap::new();

    for entry in entries {
        if !matches!(entry.risk_level, RiskLevel::High | RiskLevel::Critical) {
            continue;
        }
        if let Some(ip) = entry.metadata.ip_address.as_deref() {
            *by_ip.entry(ip).or_default() += 1;
        }
        let (count, name) = by_actor
            .entry(entry.actor_id)
            .or_insert((0, entry.actor_name.as_str()));
        *count += 1;
        *name = entry.actor_name.as_str();
    }

    let mut findings: Vec<AnomalyFinding> = Vec::new();
    for (ip, count) in by_ip {
        if count > ANOMALY_IP_THRESHOLD {
            findings.push(AnomalyFinding {
                subject: AnomalySubject::IpAddress(ip.to_owned()),
                high_severity_count: count,
            });
        }
    }
    for (actor_id, (count, name)) in by_actor {
        if count > ANOMALY_ACTOR_THRESHOLD {
            findings.push(AnomalyFinding {
                subject: AnomalySubject::Actor {
                    actor_id,
                    actor_name: name.to_owned(),
                },
                high_severity_count: count,
            });
        }
    }

    findings.sort_by(|a, b| b.high_severity_count.cmp(&a.high_severity_count));
    findings
}
