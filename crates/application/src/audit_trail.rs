//! Asynchronous, bounded audit recording pipeline.
//!
//! Entries flow through a bounded channel into a small worker pool that
//! appends them to the log store. When the channel is full the recording
//! caller performs the append itself instead of dropping the entry, so
//! overload degrades latency rather than completeness.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lykos_core::{AppResult, TenantId};
use lykos_domain::{AuditAction, AuditLogEntry, RiskLevel};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Port for append-only audit persistence.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Appends one entry. Entries are never updated or deleted.
    async fn append(&self, entry: &AuditLogEntry) -> AppResult<()>;

    /// Queries entries for a tenant, newest first.
    async fn query(&self, tenant_id: TenantId, query: &AuditLogQuery)
    -> AppResult<Vec<AuditLogEntry>>;

    /// Returns a tenant's entries in `[from, until)`, oldest first, for
    /// analytics scans.
    async fn entries_in_range(
        &self,
        tenant_id: TenantId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<AuditLogEntry>>;
}

/// Filter set for audit queries. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditLogQuery {
    /// Restrict to one actor.
    pub actor_id: Option<Uuid>,
    /// Restrict to one action.
    pub action: Option<AuditAction>,
    /// Restrict to one entity type.
    pub entity_type: Option<String>,
    /// Restrict to entries at or above this risk level.
    pub min_risk_level: Option<RiskLevel>,
    /// Inclusive lower bound on occurrence time.
    pub occurred_after: Option<DateTime<Utc>>,
    /// Exclusive upper bound on occurrence time.
    pub occurred_before: Option<DateTime<Utc>>,
    /// Page size. Stores clamp this to a sane ceiling.
    pub limit: Option<i64>,
    /// Page offset.
    pub offset: Option<i64>,
}

/// Tuning knobs for the recording pipeline.
#[derive(Debug, Clone)]
pub struct AuditTrailConfig {
    /// Bounded channel capacity.
    pub queue_capacity: usize,
    /// Number of writer tasks draining the channel.
    pub worker_count: usize,
    /// How long `shutdown` waits for workers to drain before giving up.
    pub shutdown_grace: std::time::Duration,
}

impl Default for AuditTrailConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1_000,
            worker_count: 5,
            shutdown_grace: std::time::Duration::from_secs(60),
        }
    }
}

/// Records audit entries without blocking or failing business operations.
#[derive(Clone)]
pub struct AuditTrail {
    repository: Arc<dyn AuditLogRepository>,
    sender: mpsc::Sender<AuditLogEntry>,
    shutdown: watch::Sender<bool>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    grace: std::time::Duration,
}

impl AuditTrail {
    /// Spawns the worker pool and returns a handle cheap to clone into
    /// every service.
    #[must_use]
    pub fn spawn(repository: Arc<dyn AuditLogRepository>, config: AuditTrailConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..config.worker_count.max(1))
            .map(|worker_index| {
                let repository = Arc::clone(&repository);
                let receiver = Arc::clone(&receiver);
                let mut shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    loop {
                        let entry = {
                            let mut receiver = receiver.lock().await;
                            tokio::select! {
                                entry = receiver.recv() => entry,
                                _ = shutdown_rx.changed() => {
                                    // Drain whatever is already queued, then stop.
                                    drain(&repository, &mut receiver, worker_index).await;
                                    return;
                                }
                            }
                        };

                        match entry {
                            Some(entry) => append_logged(&repository, &entry).await,
                            None => return,
                        }
                    }
                })
            })
            .collect();

        Self {
            repository,
            sender,
            shutdown,
            workers: Arc::new(Mutex::new(workers)),
            grace: config.shutdown_grace,
        }
    }

    /// Records an entry. Never returns an error and never drops the entry.
    ///
    /// The fast path enqueues for the worker pool. When the channel is full
    /// or closed, the caller appends directly, absorbing the store latency
    /// itself. Store failures are logged, not surfaced, so auditing cannot
    /// veto the operation it describes.
    pub async fn record(&self, entry: AuditLogEntry) {
        match self.sender.try_send(entry) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(entry))
            | Err(mpsc::error::TrySendError::Closed(entry)) => {
                append_logged(&self.repository, &entry).await;
            }
        }
    }

    /// Queries the log on behalf of a tenant.
    pub async fn query(
        &self,
        tenant_id: TenantId,
        query: &AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        self.repository.query(tenant_id, query).await
    }

    /// Flushes queued entries and stops the worker pool.
    ///
    /// Waits up to the configured grace period; returns `false` when the
    /// deadline passed with workers still running.
    pub async fn shutdown(&self) -> bool {
        let _ = self.shutdown.send(true);

        let mut workers = self.workers.lock().await;
        let drained = std::mem::take(&mut *workers);
        let all = async {
            for worker in drained {
                let _ = worker.await;
            }
        };

        tokio::time::timeout(self.grace, all).await.is_ok()
    }
}

async fn drain(
    repository: &Arc<dyn AuditLogRepository>,
    receiver: &mut mpsc::Receiver<AuditLogEntry>,
    worker_index: usize,
) {
    let mut flushed = 0usize;
    while let Ok(entry) = receiver.try_recv() {
        append_logged(repository, &entry).await;
        flushed += 1;
    }
    if flushed > 0 {
        tracing::debug!(worker_index, flushed, "audit worker flushed queue on shutdown");
    }
}

async fn append_logged(repository: &Arc<dyn AuditLogRepository>, entry: &AuditLogEntry) {
    if let Err(error) = repository.append(entry).await {
        tracing::error!(
            action = entry.action.as_str(),
            tenant_id = %entry.tenant_id,
            %error,
            "failed to persist audit entry"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use lykos_core::{AppError, AppResult, TenantId};
    use lykos_domain::{AuditAction, AuditLogEntry, AuditResult, RiskLevel};
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use super::{AuditLogQuery, AuditLogRepository, AuditTrail, AuditTrailConfig};

    #[derive(Default)]
    struct RecordingRepository {
        entries: Mutex<Vec<AuditLogEntry>>,
        fail_appends: AtomicUsize,
    }

    #[async_trait]
    impl AuditLogRepository for RecordingRepository {
        async fn append(&self, entry: &AuditLogEntry) -> AppResult<()> {
            if self.fail_appends.load(Ordering::SeqCst) > 0 {
                self.fail_appends.fetch_sub(1, Ordering::SeqCst);
                return Err(AppError::Internal("store unavailable".into()));
            }
            self.entries.lock().await.push(entry.clone());
            Ok(())
        }

        async fn query(
            &self,
            tenant_id: TenantId,
            _query: &AuditLogQuery,
        ) -> AppResult<Vec<AuditLogEntry>> {
            Ok(self
                .entries
                .lock()
                .await
                .iter()
                .filter(|entry| entry.tenant_id == tenant_id)
                .cloned()
                .collect())
        }

        async fn entries_in_range(
            &self,
            tenant_id: TenantId,
            from: DateTime<Utc>,
            until: DateTime<Utc>,
        ) -> AppResult<Vec<AuditLogEntry>> {
            Ok(self
                .entries
                .lock()
                .await
                .iter()
                .filter(|entry| {
                    entry.tenant_id == tenant_id
                        && entry.occurred_at >= from
                        && entry.occurred_at < until
                })
                .cloned()
                .collect())
        }
    }

    fn entry(tenant_id: TenantId, description: &str) -> AuditLogEntry {
        AuditLogEntry::builder()
            .tenant_id(tenant_id)
            .actor_id(Uuid::new_v4())
            .action(AuditAction::LoginSucceeded)
            .entity_type("employee")
            .description(description)
            .result(AuditResult::Success)
            .risk_level(RiskLevel::Low)
            .build()
            .unwrap_or_else(|_| panic!("fixture entry must build"))
    }

    #[tokio::test]
    async fn recorded_entries_reach_the_store() {
        let repository = Arc::new(RecordingRepository::default());
        let trail = AuditTrail::spawn(
            Arc::clone(&repository) as Arc<dyn AuditLogRepository>,
            AuditTrailConfig::default(),
        );
        let tenant_id = TenantId::new();

        for index in 0..20 {
            trail.record(entry(tenant_id, &format!("login {index}"))).await;
        }
        assert!(trail.shutdown().await);

        assert_eq!(repository.entries.lock().await.len(), 20);
    }

    #[tokio::test]
    async fn burst_beyond_queue_capacity_loses_nothing() {
        let repository = Arc::new(RecordingRepository::default());
        let trail = AuditTrail::spawn(
            Arc::clone(&repository) as Arc<dyn AuditLogRepository>,
            AuditTrailConfig {
                queue_capacity: 4,
                worker_count: 2,
                shutdown_grace: std::time::Duration::from_secs(10),
            },
        );
        let tenant_id = TenantId::new();

        let handles: Vec<_> = (0..200)
            .map(|index| {
                let trail = trail.clone();
                tokio::spawn(async move {
                    trail.record(entry(tenant_id, &format!("burst {index}"))).await;
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.is_ok());
        }
        assert!(trail.shutdown().await);

        assert_eq!(repository.entries.lock().await.len(), 200);
    }

    #[tokio::test]
    async fn store_failure_does_not_surface_to_the_recorder() {
        let repository = Arc::new(RecordingRepository::default());
        repository.fail_appends.store(3, Ordering::SeqCst);
        let trail = AuditTrail::spawn(
            Arc::clone(&repository) as Arc<dyn AuditLogRepository>,
            AuditTrailConfig::default(),
        );
        let tenant_id = TenantId::new();

        // record never panics or errors even while the store rejects writes.
        for index in 0..6 {
            trail.record(entry(tenant_id, &format!("flaky {index}"))).await;
        }
        assert!(trail.shutdown().await);

        assert_eq!(repository.entries.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn shutdown_flushes_queued_entries() {
        let repository = Arc::new(RecordingRepository::default());
        let trail = AuditTrail::spawn(
            Arc::clone(&repository) as Arc<dyn AuditLogRepository>,
            AuditTrailConfig {
                queue_capacity: 64,
                worker_count: 1,
                shutdown_grace: std::time::Duration::from_secs(10),
            },
        );
        let tenant_id = TenantId::new();

        for index in 0..50 {
            trail.record(entry(tenant_id, &format!("queued {index}"))).await;
        }
        assert!(trail.shutdown().await);

        assert_eq!(repository.entries.lock().await.len(), 50);
    }

    #[tokio::test]
    async fn query_is_tenant_scoped() {
        let repository = Arc::new(RecordingRepository::default());
        let trail = AuditTrail::spawn(
            Arc::clone(&repository) as Arc<dyn AuditLogRepository>,
            AuditTrailConfig::default(),
        );
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();

        trail.record(entry(tenant_a, "tenant a login")).await;
        trail.record(entry(tenant_b, "tenant b login")).await;
        assert!(trail.shutdown().await);

        let entries = trail
            .query(tenant_a, &AuditLogQuery::default())
            .await
            .unwrap_or_else(|_| panic!("query must succeed"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tenant_id, tenant_a);
    }
}
