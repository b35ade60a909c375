//! Access token issuance and validation.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use inkbase_core::time::unix_timestamp;

use super::claims::{Claims, Principal};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid access token")]
    Invalid,

    #[error("Access token issued for a different tenant")]
    TenantMismatch,

    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// Signs and verifies short-lived access tokens. Refresh tokens are opaque
/// database-backed values and never pass through here.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
}

impl JwtManager {
    /// Create a new `JwtManager` with the given HMAC secret.
    pub fn new(secret: &[u8], access_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl_secs,
        }
    }

    /// Issue an access token carrying the user's id, tenant, and role.
    /// Returns the token and its lifetime in seconds.
    pub fn issue_access_token(
        &self,
        user_id: &str,
        tenant: &str,
        role: &str,
    ) -> Result<(String, i64), TokenError> {
        let now = unix_timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            tenant: tenant.to_string(),
            role: role.to_string(),
            scope: "access".to_string(),
            iat: now,
            exp: now + self.access_ttl_secs,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        Ok((token, self.access_ttl_secs))
    }

    /// Validate a token's signature and expiry and return its claims.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|_| TokenError::Invalid)?;
        Ok(data.claims)
    }

    /// Validate a token against the tenant the request arrived for. A valid
    /// token presented under the wrong tenant is rejected.
    pub fn authenticate(&self, token: &str, tenant: &str) -> Result<Principal, TokenError> {
        let claims = self.validate(token)?;
        if !claims.is_access() {
            return Err(TokenError::Invalid);
        }
        if claims.tenant != tenant {
            return Err(TokenError::TenantMismatch);
        }
        Ok(Principal::from(claims))
    }
}
