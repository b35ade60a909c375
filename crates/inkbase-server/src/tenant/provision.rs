//! Startup provisioning for tenant databases.
//!
//! For each configured tenant, in order: ensure the database exists, open
//! its pool, run migrations, bootstrap the studio and owner account, and
//! connect the cache client. The steps for one tenant are strictly
//! sequential; the first tenant that fails aborts the whole startup.

use std::collections::HashMap;

use tracing::{info, instrument};
use uuid::Uuid;

use inkbase_core::config::{AppConfig, TenantConfig};
use inkbase_core::time::unix_timestamp;

use crate::auth::password;
use crate::cache::SessionCache;
use crate::storage::{self, Studio, TenantDatabase, User};

use super::{TenantError, TenantRegistry, TenantResources};

/// Role granted to the bootstrapped owner account.
pub const OWNER_ROLE: &str = "OWNER";

/// Provision every configured tenant and build the routing table.
pub async fn provision(config: &AppConfig) -> Result<TenantRegistry, TenantError> {
    let admin = storage::connect_admin(&config.admin_database).await?;

    let mut tenants = HashMap::with_capacity(config.tenants.len());
    for tenant in &config.tenants {
        let resources = provision_tenant(config, tenant, &admin).await?;
        tenants.insert(tenant.subdomain.clone(), resources);
    }
    admin.close().await;

    info!(tenants = tenants.len(), "Tenant provisioning complete");
    Ok(TenantRegistry::new(tenants))
}

#[instrument(skip_all, fields(tenant = %tenant.subdomain))]
async fn provision_tenant(
    config: &AppConfig,
    tenant: &TenantConfig,
    admin: &sqlx::PgPool,
) -> Result<TenantResources, TenantError> {
    storage::ensure_database(admin, &tenant.database.db).await?;

    let db = TenantDatabase::open(&tenant.database).await?;
    storage::migrate(db.pool()).await?;
    bootstrap(&db, tenant).await?;

    let cache = SessionCache::connect(&config.redis, &tenant.subdomain).await?;

    Ok(TenantResources { db, cache })
}

/// Seed the tenant database with its studio row and owner account. A no-op
/// when the studios table is already populated, so safe on every restart.
pub async fn bootstrap(db: &TenantDatabase, tenant: &TenantConfig) -> Result<(), TenantError> {
    if db.studio_count().await? > 0 {
        return Ok(());
    }

    let owner_hash =
        password::hash_password(&tenant.owner.password).map_err(|e| TenantError::Bootstrap {
            tenant: tenant.subdomain.clone(),
            message: format!("failed to hash owner password: {e}"),
        })?;

    let now = unix_timestamp();
    let studio = Studio {
        id: Uuid::new_v4().to_string(),
        subdomain: tenant.subdomain.clone(),
        name: tenant.studio.name.clone(),
        address: tenant.studio.address.clone(),
        phone: tenant.studio.phone.clone(),
        email: tenant.studio.email.clone(),
        website: tenant.studio.website.clone(),
        created_at: now,
    };
    let owner = User {
        id: Uuid::new_v4().to_string(),
        studio_id: studio.id.clone(),
        username: tenant.owner.username.clone(),
        email: tenant.owner.email.clone(),
        hashed_password: owner_hash,
        role: OWNER_ROLE.to_string(),
        created_at: now,
        updated_at: now,
    };

    db.insert_studio_and_owner(&studio, &owner).await?;
    info!(owner = %tenant.owner.email, "Tenant bootstrapped");
    Ok(())
}
