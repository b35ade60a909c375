//! Postgres connection management for tenant databases.
//!
//! One pool per tenant, opened at startup and owned by the routing table for
//! the process lifetime. A separate administrative connection (to the
//! server's maintenance database) is used only to create tenant databases
//! that do not exist yet.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use inkbase_core::config::{AdminDatabaseConfig, TenantDatabaseConfig};

/// Connection attempts made while waiting for a tenant database to accept
/// connections, with linearly growing backoff between attempts.
const CONNECT_RETRIES: u32 = 25;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Migration hash mismatch for {0}: on-disk script changed after being applied")]
    HashMismatch(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(e: sqlx::Error) -> Self {
        Self::Query(e.to_string())
    }
}

/// A tenant's database handle: the owned connection pool plus its query API.
#[derive(Clone)]
pub struct TenantDatabase {
    pool: PgPool,
}

impl TenantDatabase {
    /// Open a connection pool against the tenant's database and wait until
    /// it accepts connections.
    pub async fn open(config: &TenantDatabaseConfig) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(&config.connection_url())
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        wait_for_db(&pool).await?;
        info!(db = %config.db, "Tenant database pool opened");

        Ok(Self { pool })
    }

    /// Wrap an already-open pool. Used by tests that manage their own
    /// connection lifecycle.
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Ping the database with bounded retry/backoff until it accepts
/// connections, or fail with a connection error once the ceiling is hit.
pub async fn wait_for_db(pool: &PgPool) -> Result<(), DatabaseError> {
    let mut last_err = String::new();
    for attempt in 1..=CONNECT_RETRIES {
        match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => return Ok(()),
            Err(e) => {
                last_err = e.to_string();
                if attempt < CONNECT_RETRIES {
                    warn!(attempt, "Database not ready, retrying");
                    tokio::time::sleep(Duration::from_millis(u64::from(attempt) * 100)).await;
                }
            }
        }
    }
    Err(DatabaseError::Connection(format!(
        "database unreachable after {CONNECT_RETRIES} attempts: {last_err}"
    )))
}

/// Open a short-lived pool against the server's maintenance database for
/// administrative statements (database existence checks and creation).
pub async fn connect_admin(config: &AdminDatabaseConfig) -> Result<PgPool, DatabaseError> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(&config.connection_url())
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;

    wait_for_db(&pool).await?;
    Ok(pool)
}

/// Create the named database if it does not exist. `CREATE DATABASE` cannot
/// run inside a transaction and does not support bind parameters, so the
/// name is validated and interpolated as a quoted identifier.
pub async fn ensure_database(admin: &PgPool, name: &str) -> Result<(), DatabaseError> {
    validate_database_name(name)?;

    let exists = sqlx::query("SELECT 1 FROM pg_database WHERE datname = $1")
        .bind(name)
        .fetch_optional(admin)
        .await?
        .is_some();

    if exists {
        return Ok(());
    }

    sqlx::query(&format!(r#"CREATE DATABASE "{name}""#))
        .execute(admin)
        .await?;
    info!(db = %name, "Created tenant database");
    Ok(())
}

/// Reject names that cannot be safely interpolated as identifiers.
fn validate_database_name(name: &str) -> Result<(), DatabaseError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(DatabaseError::Query(format!(
            "invalid database name: {name:?}"
        )))
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn database_name_validation() {
        assert!(validate_database_name("inkbase_inkworks").is_ok());
        assert!(validate_database_name("tenant01").is_ok());

        assert!(validate_database_name("").is_err());
        assert!(validate_database_name("1tenant").is_err());
        assert!(validate_database_name("bad-name").is_err());
        assert!(validate_database_name(r#"x"; DROP DATABASE y; --"#).is_err());
    }
}
