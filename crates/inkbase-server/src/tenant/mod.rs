//! Tenant routing table and startup provisioning.
//!
//! The [`TenantRegistry`] maps tenant subdomains to their live database pool
//! and cache client. It is built once at startup by [`provision`] and shared
//! read-only by every request handler; no tenant is added or removed while
//! the process runs, so no synchronisation is needed on the lookup path.

mod provision;

pub use provision::{OWNER_ROLE, bootstrap, provision};

use std::collections::HashMap;

use crate::cache::{CacheError, SessionCache};
use crate::storage::{DatabaseError, TenantDatabase};

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    /// Lookup by a subdomain no descriptor was configured for. Permanent
    /// client error, not transient.
    #[error("Unknown tenant: {0}")]
    UnknownTenant(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Bootstrap error for tenant {tenant}: {message}")]
    Bootstrap { tenant: String, message: String },
}

/// A tenant's owned resources: its database handle and cache client. Lives
/// for the process lifetime.
#[derive(Clone)]
pub struct TenantResources {
    pub db: TenantDatabase,
    pub cache: SessionCache,
}

/// Immutable map from tenant subdomain to that tenant's resources.
pub struct TenantRegistry {
    tenants: HashMap<String, TenantResources>,
}

impl TenantRegistry {
    pub fn new(tenants: HashMap<String, TenantResources>) -> Self {
        Self { tenants }
    }

    /// Resolve a tenant's resources, failing with [`TenantError::UnknownTenant`]
    /// for subdomains that were never configured.
    pub fn get(&self, subdomain: &str) -> Result<&TenantResources, TenantError> {
        self.tenants
            .get(subdomain)
            .ok_or_else(|| TenantError::UnknownTenant(subdomain.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    /// Subdomains of all registered tenants.
    pub fn subdomains(&self) -> impl Iterator<Item = &str> {
        self.tenants.keys().map(String::as_str)
    }
}
