use chrono::Duration;
use lykos_application::{AuditLogQuery, AuditLogRepository};
use lykos_core::TenantId;
use lykos_domain::{AuditAction, AuditLogEntry, AuditResult, RiskLevel};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::PostgresAuditLogRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres audit log tests: {error}");
    }

    Some(pool)
}

fn entry(tenant_id: TenantId, actor_id: Uuid, action: AuditAction) -> AuditLogEntry {
    AuditLogEntry::builder()
        .tenant_id(tenant_id)
        .actor_id(actor_id)
        .actor_name("Test Actor")
        .action(action)
        .entity_type("employee")
        .description("integration test entry")
        .result(AuditResult::Success)
        .risk_level(RiskLevel::Low)
        .build()
        .unwrap_or_else(|_| panic!("fixture entry must build"))
}

#[tokio::test]
async fn append_and_query_round_trip_with_filters() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresAuditLogRepository::new(pool);
    let tenant_id = TenantId::new();
    let actor = Uuid::new_v4();
    let other_actor = Uuid::new_v4();

    for action in [
        AuditAction::LoginSucceeded,
        AuditAction::LoginFailed,
        AuditAction::GroupCreated,
    ] {
        let appended = repository.append(&entry(tenant_id, actor, action)).await;
        assert!(appended.is_ok());
    }
    let appended = repository
        .append(&entry(tenant_id, other_actor, AuditAction::LoginSucceeded))
        .await;
    assert!(appended.is_ok());

    let all = repository
        .query(tenant_id, &AuditLogQuery::default())
        .await;
    assert!(all.is_ok());
    assert_eq!(all.unwrap_or_default().len(), 4);

    let by_actor = repository
        .query(
            tenant_id,
            &AuditLogQuery {
                actor_id: Some(actor),
                ..AuditLogQuery::default()
            },
        )
        .await;
    assert!(by_actor.is_ok());
    assert_eq!(by_actor.unwrap_or_default().len(), 3);

    let by_action = repository
        .query(
            tenant_id,
            &AuditLogQuery {
                action: Some(AuditAction::LoginFailed),
                ..AuditLogQuery::default()
            },
        )
        .await;
    assert!(by_action.is_ok());
    let by_action = by_action.unwrap_or_default();
    assert_eq!(by_action.len(), 1);
    assert_eq!(by_action[0].action, AuditAction::LoginFailed);

    // Other tenants see nothing.
    let foreign = repository
        .query(TenantId::new(), &AuditLogQuery::default())
        .await;
    assert!(foreign.is_ok());
    assert!(foreign.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn range_scan_is_half_open_and_ordered() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresAuditLogRepository::new(pool);
    let tenant_id = TenantId::new();
    let actor = Uuid::new_v4();

    let first = entry(tenant_id, actor, AuditAction::LoginSucceeded);
    let second = entry(tenant_id, actor, AuditAction::LoginFailed);
    let boundary = second.occurred_at;

    assert!(repository.append(&first).await.is_ok());
    assert!(repository.append(&second).await.is_ok());

    let scanned = repository
        .entries_in_range(tenant_id, boundary - Duration::hours(1), boundary)
        .await;
    assert!(scanned.is_ok());
    let scanned = scanned.unwrap_or_default();
    // The entry at exactly the range end is excluded.
    assert!(scanned.iter().all(|entry| entry.occurred_at < boundary));
    assert!(scanned.windows(2).all(|pair| pair[0].occurred_at <= pair[1].occurred_at));
}

#[tokio::test]
async fn query_limit_is_clamped() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresAuditLogRepository::new(pool);
    let tenant_id = TenantId::new();
    let actor = Uuid::new_v4();

    let appended = repository
        .append(&entry(tenant_id, actor, AuditAction::LoginSucceeded))
        .await;
    assert!(appended.is_ok());

    // An absurd limit must not error; it gets capped server-side.
    let queried = repository
        .query(
            tenant_id,
            &AuditLogQuery {
                limit: Some(1_000_000),
                ..AuditLogQuery::default()
            },
        )
        .await;
    assert!(queried.is_ok());
}
