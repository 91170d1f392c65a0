/// Schema bootstrapper
///
/// Ensures the `categories`, `tasks` and `attachments` tables exist and seeds
/// the default categories. This is "create if absent", not a migration system: running it
/// against a database that already has the schema changes nothing.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE categories (
///     id SERIAL PRIMARY KEY,
///     name VARCHAR(100) NOT NULL UNIQUE,
///     color VARCHAR(7) NOT NULL DEFAULT '#6c757d',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE tasks (
///     id SERIAL PRIMARY KEY,
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     category_id INTEGER REFERENCES categories(id),
///     priority VARCHAR(10) NOT NULL DEFAULT 'medium',
///     status VARCHAR(20) NOT NULL DEFAULT 'pending',
///     due_date DATE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE attachments (
///     id SERIAL PRIMARY KEY,
///     task_id INTEGER NOT NULL REFERENCES tasks(id),
///     filename VARCHAR(255) NOT NULL,
///     description TEXT,
///     content_type VARCHAR(255) NOT NULL,
///     size_bytes BIGINT NOT NULL,
///     blob_name VARCHAR(512) NOT NULL UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Neither foreign key has an `ON DELETE` action. A category that still has
/// tasks cannot be deleted, and a task delete removes its attachment rows
/// explicitly in the same transaction so the caller learns which blobs to drop.

use sqlx::postgres::PgPool;
use tracing::{debug, info};

/// Advisory lock key serializing concurrent bootstraps across processes
const BOOTSTRAP_LOCK_KEY: i64 = 0x7461_736b_626f_6172;

/// Default categories seeded on first start: (name, color)
pub const DEFAULT_CATEGORIES: [(&str, &str); 4] = [
    ("Personal", "#3498db"),
    ("Work", "#2ecc71"),
    ("Urgent", "#e74c3c"),
    ("Projects", "#9b59b6"),
];

/// DDL statements, executed in order
pub const SCHEMA_STATEMENTS: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id SERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL UNIQUE,
        color VARCHAR(7) NOT NULL DEFAULT '#6c757d',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id SERIAL PRIMARY KEY,
        title VARCHAR(255) NOT NULL CHECK (length(btrim(title)) > 0),
        description TEXT,
        category_id INTEGER REFERENCES categories(id),
        priority VARCHAR(10) NOT NULL DEFAULT 'medium'
            CHECK (priority IN ('low', 'medium', 'high')),
        status VARCHAR(20) NOT NULL DEFAULT 'pending'
            CHECK (status IN ('pending', 'in-progress', 'completed')),
        due_date DATE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks (created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS attachments (
        id SERIAL PRIMARY KEY,
        task_id INTEGER NOT NULL REFERENCES tasks(id),
        filename VARCHAR(255) NOT NULL CHECK (length(btrim(filename)) > 0),
        description TEXT,
        content_type VARCHAR(255) NOT NULL,
        size_bytes BIGINT NOT NULL CHECK (size_bytes > 0),
        blob_name VARCHAR(512) NOT NULL UNIQUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_attachments_task_id ON attachments (task_id)",
];

/// Creates missing tables and seeds default categories
///
/// Runs in a single transaction holding an advisory lock, so two processes
/// starting at once do not race on `CREATE TABLE`.
///
/// # Errors
///
/// Returns the driver error if the database is unreachable or a statement fails.
pub async fn bootstrap(pool: &PgPool) -> Result<(), sqlx::Error> {
    info!("Ensuring database schema");

    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(BOOTSTRAP_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    let mut seeded = 0u64;
    for (name, color) in DEFAULT_CATEGORIES {
        let result = sqlx::query(
            "INSERT INTO categories (name, color) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(color)
        .execute(&mut *tx)
        .await?;
        seeded += result.rows_affected();
    }

    tx.commit().await?;

    debug!(seeded_categories = seeded, "Default categories ensured");
    info!("Database schema ready");
    Ok(())
}
