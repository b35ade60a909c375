//! Hash-checked migration runner.
//!
//! Applies the embedded SQL scripts to one tenant database in lexicographic
//! name order, recording `(name, hash)` in a `_migrations` table. Scripts
//! already applied with a matching content hash are skipped; a recorded hash
//! that differs from the shipped script is a fatal integrity violation (the
//! database was migrated by an incompatible version of the scripts). Running
//! the runner twice in a row is a no-op the second time.

use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::info;

use super::db::DatabaseError;

/// Migration scripts shipped with the binary. Names carry zero-padded
/// sequence prefixes so lexicographic order equals chronological order.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_init.sql", include_str!("../../migrations/0001_init.sql")),
    (
        "0002_sessions.sql",
        include_str!("../../migrations/0002_sessions.sql"),
    ),
    (
        "0003_refresh_tokens.sql",
        include_str!("../../migrations/0003_refresh_tokens.sql"),
    ),
];

/// Apply all pending migrations to the given database.
pub async fn migrate(pool: &PgPool) -> Result<(), DatabaseError> {
    run_scripts(pool, MIGRATIONS).await
}

async fn run_scripts(pool: &PgPool, scripts: &[(&str, &str)]) -> Result<(), DatabaseError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            hash TEXT NOT NULL,
            created_at BIGINT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    let applied: HashMap<String, String> =
        sqlx::query_as::<_, (String, String)>("SELECT name, hash FROM _migrations")
            .fetch_all(pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?
            .into_iter()
            .collect();

    let mut ordered: Vec<(&str, &str)> = scripts.to_vec();
    ordered.sort_by_key(|(name, _)| *name);

    for (name, contents) in ordered {
        let hash = content_hash(contents);

        if let Some(prev_hash) = applied.get(name) {
            if *prev_hash != hash {
                return Err(DatabaseError::HashMismatch(name.to_string()));
            }
            continue;
        }

        if contains_create_database(contents) {
            // CREATE DATABASE is disallowed inside a transaction; the
            // metadata insert follows as a separate statement.
            sqlx::query(contents)
                .execute(pool)
                .await
                .map_err(|e| DatabaseError::Migration(format!("{name}: {e}")))?;
            record_applied(pool, name, &hash).await?;
        } else {
            let mut tx = pool
                .begin()
                .await
                .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            sqlx::query(contents)
                .execute(&mut *tx)
                .await
                .map_err(|e| DatabaseError::Migration(format!("{name}: {e}")))?;
            sqlx::query("INSERT INTO _migrations (name, hash, created_at) VALUES ($1, $2, $3)")
                .bind(name)
                .bind(&hash)
                .bind(inkbase_core::time::unix_timestamp())
                .execute(&mut *tx)
                .await
                .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            tx.commit()
                .await
                .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        }

        info!(migration = name, "Migration applied");
    }

    Ok(())
}

async fn record_applied(pool: &PgPool, name: &str, hash: &str) -> Result<(), DatabaseError> {
    sqlx::query("INSERT INTO _migrations (name, hash, created_at) VALUES ($1, $2, $3)")
        .bind(name)
        .bind(hash)
        .bind(inkbase_core::time::unix_timestamp())
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    Ok(())
}

/// SHA-256 of the script contents, hex-encoded.
fn content_hash(contents: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Database-creation statements must run outside a transaction.
fn contains_create_database(contents: &str) -> bool {
    contents
        .to_ascii_uppercase()
        .contains("CREATE DATABASE")
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn scripts_are_lexicographically_ordered() {
        let names: Vec<&str> = MIGRATIONS.iter().map(|(name, _)| *name).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn script_names_are_unique() {
        let mut names: Vec<&str> = MIGRATIONS.iter().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), MIGRATIONS.len());
    }

    #[test]
    fn content_hash_is_deterministic() {
        let h1 = content_hash("CREATE TABLE t (id TEXT);");
        let h2 = content_hash("CREATE TABLE t (id TEXT);");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);

        let h3 = content_hash("CREATE TABLE t (id TEXT, name TEXT);");
        assert_ne!(h1, h3);
    }

    #[test]
    fn detects_create_database_statements() {
        assert!(contains_create_database("CREATE DATABASE tenant_a"));
        assert!(contains_create_database("create database tenant_a;"));
        assert!(!contains_create_database("CREATE TABLE sessions (id TEXT)"));
    }
}
