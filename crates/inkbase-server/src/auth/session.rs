//! The canonical session value.
//!
//! One type serves both the cache payload and the domain: the storage row
//! ([`crate::storage::SessionRow`]) holds only validity bookkeeping, and any
//! wire representation maps from this value at the transport boundary.

use serde::{Deserialize, Serialize};

/// An authenticated session, scoped to one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Server-generated opaque session id.
    pub session_id: String,
    /// Principal this session belongs to.
    pub user_id: String,
    pub username: String,
    pub email: String,
    /// Tenant subdomain the session is scoped to.
    pub tenant: String,
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn serializes_round_trip() {
        let session = Session {
            session_id: "s-1".to_string(),
            user_id: "u-1".to_string(),
            username: "owner".to_string(),
            email: "owner@inkworks.test".to_string(),
            tenant: "inkworks".to_string(),
        };

        let json = serde_json::to_string(&session).unwrap();
        let parsed: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, session);
    }
}
