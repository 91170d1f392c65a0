/// Integration tests for the PostgreSQL store
///
/// These tests require a running PostgreSQL database and are ignored by default.
/// Run with: cargo test -p taskboard-shared --test postgres_store_tests -- --ignored --test-threads=1
///
/// Connection settings come from the usual variables:
/// export DB_HOST=localhost DB_NAME=taskboard_test DB_USER=taskboard DB_PASSWORD=taskboard

use std::env;
use std::sync::Arc;
use taskboard_shared::db::pool::{create_pool, DatabaseConfig};
use taskboard_shared::db::schema::{self, DEFAULT_CATEGORIES};
use taskboard_shared::error::StoreError;
use taskboard_shared::lifecycle::{TaskLifecycle, TaskOrder};
use taskboard_shared::models::{NewAttachment, NewCategory, NewTask, Priority, TaskStatus, Upload};
use taskboard_shared::store::{PgStore, TaskStore};

/// Helper to build database settings from environment
fn test_database_config() -> DatabaseConfig {
    let defaults = DatabaseConfig::default();
    DatabaseConfig {
        host: env::var("DB_HOST").unwrap_or(defaults.host),
        port: env::var("DB_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port),
        database: env::var("DB_NAME").unwrap_or_else(|_| "taskboard_test".to_string()),
        username: env::var("DB_USER").unwrap_or(defaults.username),
        password: env::var("DB_PASSWORD").unwrap_or_else(|_| "taskboard".to_string()),
        ssl_mode: env::var("DB_SSLMODE").unwrap_or_else(|_| "disable".to_string()),
        ..defaults
    }
}

async fn fresh_store() -> PgStore {
    let pool = create_pool(&test_database_config()).expect("Failed to create pool");
    sqlx::query("DROP TABLE IF EXISTS attachments")
        .execute(&pool)
        .await
        .expect("Failed to drop attachments");
    sqlx::query("DROP TABLE IF EXISTS tasks")
        .execute(&pool)
        .await
        .expect("Failed to drop tasks");
    sqlx::query("DROP TABLE IF EXISTS categories")
        .execute(&pool)
        .await
        .expect("Failed to drop categories");
    PgStore::new(pool)
}

fn titled(title: &str, priority: Priority) -> NewTask {
    NewTask {
        title: title.to_string(),
        priority,
        ..Default::default()
    }
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_bootstrap_is_idempotent() {
    let store = fresh_store().await;

    schema::bootstrap(store.pool()).await.expect("First bootstrap failed");
    schema::bootstrap(store.pool()).await.expect("Second bootstrap failed");

    let categories = store.list_categories().await.unwrap();
    assert_eq!(categories.len(), DEFAULT_CATEGORIES.len());

    store.close().await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_duplicate_category_leaves_table_unchanged() {
    let store = fresh_store().await;
    let before = store.list_categories().await.unwrap();

    let (category, inserted) = store
        .create_category(&NewCategory {
            name: "Work".to_string(),
            color: Some("#000000".to_string()),
        })
        .await
        .unwrap();

    assert!(!inserted);
    assert_eq!(Some(&category), before.iter().find(|c| c.name == "Work"));
    assert_eq!(store.list_categories().await.unwrap(), before);

    store.close().await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_foreign_key_enforced() {
    let store = fresh_store().await;

    let err = store
        .create_task(&NewTask {
            category_id: Some(987_654),
            ..titled("Orphan", Priority::Low)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ConstraintViolation(_)), "{:?}", err);

    let work = store
        .list_categories()
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.name == "Work")
        .unwrap();
    let task = store
        .create_task(&NewTask {
            category_id: Some(work.id),
            ..titled("Report", Priority::High)
        })
        .await
        .unwrap();
    assert_eq!(task.category_name.as_deref(), Some("Work"));

    let err = store.delete_category(work.id).await.unwrap_err();
    assert!(matches!(err, StoreError::ConstraintViolation(_)), "{:?}", err);

    store.close().await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_lifecycle_against_postgres() {
    let store = Arc::new(fresh_store().await);
    let lifecycle = TaskLifecycle::new(store.clone());

    let low = lifecycle.create(titled("t1", Priority::Low)).await.unwrap();
    let high = lifecycle.create(titled("t2", Priority::High)).await.unwrap();
    let medium = lifecycle.create(titled("t3", Priority::Medium)).await.unwrap();

    let board: Vec<i32> = lifecycle
        .list(TaskOrder::Dashboard)
        .await
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(board, vec![high.id, medium.id, low.id]);

    let newest: Vec<i32> = lifecycle
        .list(TaskOrder::Newest)
        .await
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(newest, vec![medium.id, high.id, low.id]);

    let started = lifecycle.start(low.id).await.unwrap();
    assert_eq!(started.task().status, TaskStatus::InProgress);
    assert!(started.task().updated_at >= low.updated_at);

    lifecycle.complete(low.id).await.unwrap();
    let reopened = lifecycle.start(low.id).await.unwrap();
    assert!(!reopened.is_applied());
    assert_eq!(reopened.task().status, TaskStatus::Completed);

    let stats = lifecycle.stats().await.unwrap();
    assert_eq!((stats.total, stats.pending, stats.completed), (3, 2, 1));

    lifecycle.delete(high.id).await.unwrap();
    assert!(matches!(
        lifecycle.get(high.id).await.unwrap_err(),
        StoreError::NotFound { .. }
    ));
    assert_eq!(lifecycle.stats().await.unwrap().total, 2);

    store.close().await;
}

fn note(task_id: i32, filename: &str) -> NewAttachment {
    NewAttachment::from_upload(
        task_id,
        &Upload {
            filename: filename.to_string(),
            content_type: Some("text/plain".to_string()),
            description: None,
            body: bytes::Bytes::from_static(b"contents"),
        },
    )
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_attachments_join_and_delete_with_task() {
    let store = fresh_store().await;

    let task = store.create_task(&titled("Trip", Priority::Medium)).await.unwrap();
    let other = store.create_task(&titled("Other", Priority::Low)).await.unwrap();
    assert!(task.attachments.is_empty());

    let first = store.create_attachment(&note(task.id, "a.txt")).await.unwrap();
    let second = store.create_attachment(&note(task.id, "b.txt")).await.unwrap();
    let kept = store.create_attachment(&note(other.id, "c.txt")).await.unwrap();
    assert_eq!(first.size_bytes, 8);
    assert!(first.created_at.is_some());

    let found = store.find_task(task.id).await.unwrap().unwrap();
    assert_eq!(found.attachments, vec![first.clone(), second.clone()]);

    let mut removed = store.delete_task(task.id).await.unwrap().unwrap();
    removed.sort_by_key(|a| a.id);
    assert_eq!(removed, vec![first.clone(), second]);
    assert_eq!(store.find_attachment(first.id).await.unwrap(), None);
    assert_eq!(store.find_attachment(kept.id).await.unwrap(), Some(kept));

    assert_eq!(store.delete_task(task.id).await.unwrap(), None);

    store.close().await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_attachment_constraints() {
    let store = fresh_store().await;
    let task = store.create_task(&titled("Trip", Priority::Medium)).await.unwrap();

    let err = store.create_attachment(&note(424_242, "x.txt")).await.unwrap_err();
    assert!(matches!(err, StoreError::ConstraintViolation(_)), "{:?}", err);

    let data = note(task.id, "x.txt");
    store.create_attachment(&data).await.unwrap();
    let err = store.create_attachment(&data).await.unwrap_err();
    assert!(matches!(err, StoreError::ConstraintViolation(_)), "{:?}", err);

    store.close().await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_category_create_survives_concurrent_delete() {
    let store = Arc::new(fresh_store().await);
    store.ensure_schema().await.unwrap();

    let temp = NewCategory {
        name: "Temp".to_string(),
        color: None,
    };

    for _ in 0..50 {
        let (category, _) = store.create_category(&temp).await.unwrap();

        let deleter = {
            let store = store.clone();
            tokio::spawn(async move { store.delete_category(category.id).await })
        };
        let creator = {
            let store = store.clone();
            let temp = temp.clone();
            tokio::spawn(async move { store.create_category(&temp).await })
        };

        deleter.await.unwrap().unwrap();
        match creator.await.unwrap() {
            Ok((created, _)) => assert_eq!(created.name, "Temp"),
            Err(StoreError::ConstraintViolation(_)) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }

        for leftover in store.list_categories().await.unwrap() {
            if leftover.name == "Temp" {
                store.delete_category(leftover.id).await.unwrap();
            }
        }
    }

    store.close().await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_statement_timeout_is_unavailable() {
    let store = fresh_store().await;

    let mut tx = store.pool().begin().await.unwrap();
    sqlx::query("SET LOCAL statement_timeout = 1")
        .execute(&mut *tx)
        .await
        .unwrap();
    let err = sqlx::query("SELECT pg_sleep(1)")
        .execute(&mut *tx)
        .await
        .unwrap_err();
    tx.rollback().await.unwrap();

    match StoreError::from(err) {
        StoreError::DatabaseUnavailable(message) => assert!(message.contains("timed out")),
        other => panic!("expected DatabaseUnavailable, got {:?}", other),
    }

    store.close().await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_integrity_errors_are_constraint_violations() {
    let store = fresh_store().await;
    schema::bootstrap(store.pool()).await.unwrap();

    let check = sqlx::query("INSERT INTO tasks (title) VALUES ('   ')")
        .execute(store.pool())
        .await
        .unwrap_err();
    match StoreError::from(check) {
        StoreError::ConstraintViolation(detail) => assert!(detail.contains("tasks_title_check")),
        other => panic!("expected ConstraintViolation, got {:?}", other),
    }

    let unique = sqlx::query("INSERT INTO categories (name) VALUES ('Work')")
        .execute(store.pool())
        .await
        .unwrap_err();
    match StoreError::from(unique) {
        StoreError::ConstraintViolation(detail) => {
            assert!(detail.contains("categories_name_key"))
        }
        other => panic!("expected ConstraintViolation, got {:?}", other),
    }

    let not_null = sqlx::query("INSERT INTO tasks (title) VALUES (NULL)")
        .execute(store.pool())
        .await
        .unwrap_err();
    assert!(matches!(
        StoreError::from(not_null),
        StoreError::ConstraintViolation(_)
    ));

    store.close().await;
}

#[tokio::test]
async fn test_unreachable_database_is_unavailable() {
    let config = DatabaseConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        acquire_timeout_seconds: 1,
        ..Default::default()
    };
    let store = PgStore::new(create_pool(&config).unwrap());

    let err = store.list_tasks().await.unwrap_err();
    assert!(matches!(err, StoreError::DatabaseUnavailable(_)), "{:?}", err);
}
