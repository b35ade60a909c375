//! Redis-backed session cache.
//!
//! Each tenant owns one [`SessionCache`], assigned a logical Redis database
//! by hashing the subdomain. Two tenants may collide onto the same logical
//! database; the isolation boundary is the tenant prefix baked into every
//! key, so colliding tenants still cannot read each other's entries.

use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::info;

use inkbase_core::config::RedisConfig;

/// Number of logical databases a stock Redis server exposes.
pub const REDIS_LOGICAL_DBS: u8 = 16;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    Connection(String),

    #[error("Cache command error: {0}")]
    Command(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        Self::Command(e.to_string())
    }
}

/// Deterministically assign a tenant to a logical Redis database: sum of
/// subdomain byte values modulo the database count.
pub fn logical_db_index(subdomain: &str) -> u8 {
    let sum: u32 = subdomain.bytes().map(u32::from).sum();
    #[allow(clippy::cast_possible_truncation)]
    let index = (sum % u32::from(REDIS_LOGICAL_DBS)) as u8;
    index
}

/// Tenant-prefixed cache key for a session.
pub fn session_key(tenant: &str, session_id: &str) -> String {
    format!("session:{tenant}:{session_id}")
}

/// One tenant's handle to the session cache.
#[derive(Clone)]
pub struct SessionCache {
    conn: ConnectionManager,
    tenant: String,
}

impl SessionCache {
    /// Connect to the tenant's assigned logical database.
    pub async fn connect(config: &RedisConfig, tenant: &str) -> Result<Self, CacheError> {
        let db_index = logical_db_index(tenant);
        let client = redis::Client::open(config.connection_url(db_index))
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        info!(tenant, db_index, "Session cache connected");
        Ok(Self {
            conn,
            tenant: tenant.to_string(),
        })
    }

    /// Wrap an existing connection. Used by tests.
    pub fn from_connection(conn: ConnectionManager, tenant: &str) -> Self {
        Self {
            conn,
            tenant: tenant.to_string(),
        }
    }

    /// Read a cached session payload.
    pub async fn get(&self, session_id: &str) -> Result<Option<String>, CacheError> {
        let key = session_key(&self.tenant, session_id);
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    /// Store a session payload with a time-to-live. The TTL must never
    /// exceed the remaining validity of the durable session row.
    pub async fn set(
        &self,
        session_id: &str,
        payload: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let key = session_key(&self.tenant, session_id);
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, payload, ttl.as_secs()).await?;
        Ok(())
    }

    /// Delete a cached session. This is the authoritative invalidation step
    /// for logout.
    pub async fn delete(&self, session_id: &str) -> Result<(), CacheError> {
        let key = session_key(&self.tenant, session_id);
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn logical_db_assignment_is_deterministic() {
        let a = logical_db_index("inkworks");
        let b = logical_db_index("inkworks");
        assert_eq!(a, b);
        assert!(a < REDIS_LOGICAL_DBS);
    }

    #[test]
    fn logical_db_assignment_matches_byte_sum() {
        // "ab" = 97 + 98 = 195; 195 % 16 = 3
        assert_eq!(logical_db_index("ab"), 3);
        assert_eq!(logical_db_index(""), 0);
    }

    #[test]
    fn session_keys_are_tenant_prefixed() {
        let key_a = session_key("studio-a", "s-123");
        let key_b = session_key("studio-b", "s-123");

        assert_eq!(key_a, "session:studio-a:s-123");
        // Same session id under different tenants never collides.
        assert_ne!(key_a, key_b);
    }
}
