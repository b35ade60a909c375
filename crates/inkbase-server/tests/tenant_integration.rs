//! Integration tests against a live Postgres + Redis pair.
//!
//! Skipped unless `INKBASE_TEST_PG_HOST` and `INKBASE_TEST_REDIS_HOST` are
//! set (with `INKBASE_TEST_PG_USER` / `INKBASE_TEST_PG_PASSWORD` as needed).
//! Each test provisions throwaway tenant databases with unique names so the
//! tests can run in parallel.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::print_stderr)]

use std::sync::Arc;

use uuid::Uuid;

use inkbase_core::config::{
    AdminDatabaseConfig, AppConfig, AuthConfig, OwnerConfig, RedisConfig, StudioConfig,
    TenantConfig, TenantDatabaseConfig,
};
use inkbase_server::auth::{AuthError, AuthService, JwtManager};
use inkbase_server::storage::{self, DatabaseError};
use inkbase_server::tenant::{self, TenantRegistry};

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Build a deployment config for the given tenants, or `None` when the
/// integration environment is not configured.
fn test_config(tenants: &[(&str, &str)]) -> Option<AppConfig> {
    let pg_host = env("INKBASE_TEST_PG_HOST")?;
    let redis_host = env("INKBASE_TEST_REDIS_HOST")?;
    let pg_port: u16 = env("INKBASE_TEST_PG_PORT")
        .and_then(|v| v.parse().ok())
        .unwrap_or(5432);
    let redis_port: u16 = env("INKBASE_TEST_REDIS_PORT")
        .and_then(|v| v.parse().ok())
        .unwrap_or(6379);
    let pg_user = env("INKBASE_TEST_PG_USER").unwrap_or_else(|| "postgres".to_string());
    let pg_password = env("INKBASE_TEST_PG_PASSWORD").unwrap_or_default();

    let tenants = tenants
        .iter()
        .map(|(subdomain, db)| TenantConfig {
            subdomain: (*subdomain).to_string(),
            studio: StudioConfig {
                name: format!("{subdomain} studio"),
                address: String::new(),
                phone: String::new(),
                email: format!("hello@{subdomain}.test"),
                website: String::new(),
            },
            owner: OwnerConfig {
                username: "owner".to_string(),
                email: format!("owner@{subdomain}.test"),
                password: "correct-horse".to_string(),
                display_name: "Owner".to_string(),
            },
            database: TenantDatabaseConfig {
                host: pg_host.clone(),
                port: pg_port,
                username: pg_user.clone(),
                password: pg_password.clone(),
                db: (*db).to_string(),
            },
        })
        .collect();

    Some(AppConfig {
        auth: AuthConfig {
            jwt_secret: "integration-test-secret".to_string(),
            ..AuthConfig::default()
        },
        redis: RedisConfig {
            host: redis_host,
            port: redis_port,
            password: env("INKBASE_TEST_REDIS_PASSWORD"),
        },
        admin_database: AdminDatabaseConfig {
            host: pg_host,
            port: pg_port,
            username: pg_user,
            password: pg_password,
            db: "postgres".to_string(),
        },
        tenants,
    })
}

fn unique_db() -> String {
    format!("inkbase_test_{}", Uuid::new_v4().simple())
}

fn auth_service(registry: &Arc<TenantRegistry>, config: &AppConfig) -> AuthService {
    let jwt = Arc::new(JwtManager::new(
        config.auth.jwt_secret.as_bytes(),
        config.auth.access_ttl_secs,
    ));
    AuthService::new(Arc::clone(registry), jwt, &config.auth)
}

macro_rules! require_env {
    ($tenants:expr) => {
        match test_config($tenants) {
            Some(config) => config,
            None => {
                eprintln!("skipping: INKBASE_TEST_PG_HOST / INKBASE_TEST_REDIS_HOST not set");
                return;
            }
        }
    };
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db_name = unique_db();
    let config = require_env!(&[("migrate-test", db_name.as_str())]);

    let registry = tenant::provision(&config).await.unwrap();
    let pool = registry.get("migrate-test").unwrap().db.pool().clone();

    let count_before: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count_before.0 as usize, storage::MIGRATIONS.len());

    // Second run applies nothing and produces no errors.
    storage::migrate(&pool).await.unwrap();

    let count_after: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count_before.0, count_after.0);
}

#[tokio::test]
async fn migration_hash_mismatch_is_fatal() {
    let db_name = unique_db();
    let config = require_env!(&[("hash-test", db_name.as_str())]);

    let registry = tenant::provision(&config).await.unwrap();
    let pool = registry.get("hash-test").unwrap().db.pool().clone();

    // Simulate a database migrated by an incompatible script version.
    sqlx::query("UPDATE _migrations SET hash = 'deadbeef' WHERE name = '0001_init.sql'")
        .execute(&pool)
        .await
        .unwrap();

    let err = storage::migrate(&pool).await.unwrap_err();
    assert!(matches!(err, DatabaseError::HashMismatch(name) if name == "0001_init.sql"));
}

#[tokio::test]
async fn bootstrap_is_idempotent() {
    let db_name = unique_db();
    let config = require_env!(&[("bootstrap-test", db_name.as_str())]);

    let registry = tenant::provision(&config).await.unwrap();
    let resources = registry.get("bootstrap-test").unwrap();

    tenant::bootstrap(&resources.db, &config.tenants[0])
        .await
        .unwrap();

    assert_eq!(resources.db.studio_count().await.unwrap(), 1);
    let owner = resources
        .db
        .get_user_by_email("owner@bootstrap-test.test")
        .await
        .unwrap();
    assert_eq!(owner.role, "OWNER");
}

#[tokio::test]
async fn sessions_are_isolated_between_tenants() {
    // "ab" and "ba" have the same byte sum, so they collide onto the same
    // logical Redis database; key prefixing must still keep them apart.
    let db_a = unique_db();
    let db_b = unique_db();
    let config = require_env!(&[("ab", db_a.as_str()), ("ba", db_b.as_str())]);

    let registry = Arc::new(tenant::provision(&config).await.unwrap());
    let auth = auth_service(&registry, &config);

    let outcome = auth
        .login("ab", "owner@ab.test", "correct-horse")
        .await
        .unwrap();

    let session = auth.get_session("ab", &outcome.session_id).await.unwrap();
    assert_eq!(session.tenant, "ab");

    let err = auth.get_session("ba", &outcome.session_id).await.unwrap_err();
    assert!(matches!(err, AuthError::SessionNotFound));
}

#[tokio::test]
async fn cache_aside_reconstructs_sessions() {
    let db_name = unique_db();
    let config = require_env!(&[("cacheaside", db_name.as_str())]);

    let registry = Arc::new(tenant::provision(&config).await.unwrap());
    let auth = auth_service(&registry, &config);
    let resources = registry.get("cacheaside").unwrap();

    // A valid session row with no cache entry, as after a cache restart.
    let owner = resources
        .db
        .get_user_by_email("owner@cacheaside.test")
        .await
        .unwrap();
    let session_id = Uuid::new_v4().to_string();
    let expires_at = inkbase_core::time::unix_timestamp() + 3600;
    resources
        .db
        .insert_session(&session_id, &owner.id, expires_at)
        .await
        .unwrap();

    let session = auth.get_session("cacheaside", &session_id).await.unwrap();
    assert_eq!(session.user_id, owner.id);

    // Remove the durable row: a second lookup succeeding proves the first
    // call repopulated the cache.
    sqlx::query("DELETE FROM sessions WHERE session_id = $1")
        .bind(&session_id)
        .execute(resources.db.pool())
        .await
        .unwrap();

    let cached = auth.get_session("cacheaside", &session_id).await.unwrap();
    assert_eq!(cached.user_id, owner.id);
}

#[tokio::test]
async fn refresh_tokens_rotate() {
    let db_name = unique_db();
    let config = require_env!(&[("rotation", db_name.as_str())]);

    let registry = Arc::new(tenant::provision(&config).await.unwrap());
    let auth = auth_service(&registry, &config);

    let outcome = auth
        .login("rotation", "owner@rotation.test", "correct-horse")
        .await
        .unwrap();
    let first = outcome.tokens.refresh_token;

    let rotated = auth.refresh_session("rotation", &first).await.unwrap();
    assert_ne!(rotated.refresh_token, first);

    // The consumed token is dead; the newly issued one works.
    let err = auth.refresh_session("rotation", &first).await.unwrap_err();
    assert!(matches!(err, AuthError::RefreshTokenExpired));

    auth.refresh_session("rotation", &rotated.refresh_token)
        .await
        .unwrap();
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let db_name = unique_db();
    let config = require_env!(&[("logout-test", db_name.as_str())]);

    let registry = Arc::new(tenant::provision(&config).await.unwrap());
    let auth = auth_service(&registry, &config);

    let outcome = auth
        .login("logout-test", "owner@logout-test.test", "correct-horse")
        .await
        .unwrap();

    auth.logout("logout-test", &outcome.session_id).await.unwrap();

    let err = auth
        .get_session("logout-test", &outcome.session_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::SessionExpired | AuthError::SessionNotFound
    ));
}

#[tokio::test]
async fn password_change_revokes_refresh_tokens() {
    let db_name = unique_db();
    let config = require_env!(&[("pwchange", db_name.as_str())]);

    let registry = Arc::new(tenant::provision(&config).await.unwrap());
    let auth = auth_service(&registry, &config);

    let outcome = auth
        .login("pwchange", "owner@pwchange.test", "correct-horse")
        .await
        .unwrap();

    auth.change_password("pwchange", "owner@pwchange.test", "correct-horse", "new-stapler")
        .await
        .unwrap();

    let err = auth
        .refresh_session("pwchange", &outcome.tokens.refresh_token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::RefreshTokenExpired));

    auth.login("pwchange", "owner@pwchange.test", "new-stapler")
        .await
        .unwrap();
}

#[tokio::test]
async fn end_to_end_inkworks_scenario() {
    let db_name = unique_db();
    let config = require_env!(&[("inkworks", db_name.as_str())]);

    let registry = Arc::new(tenant::provision(&config).await.unwrap());
    let auth = auth_service(&registry, &config);

    let outcome = auth
        .login("inkworks", "owner@inkworks.test", "correct-horse")
        .await
        .unwrap();
    assert!(!outcome.tokens.access_token.is_empty());
    assert!(!outcome.tokens.refresh_token.is_empty());

    let err = auth
        .login("inkworks", "owner@inkworks.test", "wrong")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));

    let session = auth.get_session("inkworks", &outcome.session_id).await.unwrap();
    assert_eq!(session.tenant, "inkworks");

    // Unknown tenants are a permanent routing error.
    let err = auth
        .login("nowhere", "owner@inkworks.test", "correct-horse")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Tenant(_)));
}
