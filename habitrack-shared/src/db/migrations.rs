/// Schema migrations
///
/// The SQL files under the workspace `migrations/` directory are embedded
/// at compile time, so the binary carries its own schema.
///
/// # Example
///
/// ```no_run
/// use habitrack_shared::db::migrations::{migration_status, run_migrations};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// run_migrations(&pool).await?;
/// assert!(migration_status(&pool).await?.is_up_to_date());
/// # Ok(())
/// # }
/// ```

use sqlx::{migrate::Migrator, postgres::PgPool};
use tracing::{debug, error, info};

pub static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Successfully applied versions, ascending
    pub applied: Vec<i64>,

    /// Embedded versions not yet applied, ascending
    pub pending: Vec<i64>,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn latest_applied(&self) -> Option<i64> {
        self.applied.last().copied()
    }
}

/// Embedded up-migration versions, ascending
pub fn embedded_versions() -> Vec<i64> {
    let mut versions: Vec<i64> = MIGRATOR
        .iter()
        .filter(|m| m.migration_type.is_up_migration())
        .map(|m| m.version)
        .collect();
    versions.sort_unstable();
    versions.dedup();
    versions
}

/// Applies every pending migration
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!(embedded = embedded_versions().len(), "Running database migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        error!(error = %e, "Migration failed");
        e
    })?;

    info!("Database schema is up to date");
    Ok(())
}

/// Compares applied versions with the embedded set
pub async fn migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = current_schema() AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    let applied: Vec<i64> = if table_exists {
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success ORDER BY version")
            .fetch_all(pool)
            .await?
    } else {
        Vec::new()
    };

    let pending = pending_versions(&embedded_versions(), &applied);
    debug!(applied = applied.len(), pending = pending.len(), "Migration status");

    Ok(MigrationStatus { applied, pending })
}

fn pending_versions(embedded: &[i64], applied: &[i64]) -> Vec<i64> {
    embedded
        .iter()
        .copied()
        .filter(|version| !applied.contains(version))
        .collect()
}
