//! JWT claims and the request principal derived from them.

use serde::{Deserialize, Serialize};

/// Claims embedded in signed access tokens. Access tokens are stateless:
/// verified by signature and expiry, never looked up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// Tenant subdomain the token was issued for.
    pub tenant: String,
    /// Role held by the user at issue time.
    pub role: String,
    /// Token scope; always "access" (refresh tokens are opaque, not JWTs).
    pub scope: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

impl Claims {
    pub fn is_access(&self) -> bool {
        self.scope == "access"
    }
}

/// Authenticated identity extracted from a verified access token. Passed
/// explicitly to operations that act as a user; never stashed in ambient
/// request state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub tenant: String,
    pub role: String,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            tenant: claims.tenant,
            role: claims.role,
        }
    }
}
