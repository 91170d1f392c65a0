/// Database layer for Taskboard
///
/// # Modules
///
/// - `pool`: lazily-connecting PostgreSQL pool with statement timeouts
/// - `schema`: idempotent schema bootstrap and default category seed
///
/// Entity queries live with their models in the `models` module.
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::db::{pool::{create_pool, DatabaseConfig}, schema};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(&DatabaseConfig::default())?;
/// schema::bootstrap(&pool).await?;
/// # Ok(())
/// # }
/// ```

pub mod pool;
pub mod schema;
