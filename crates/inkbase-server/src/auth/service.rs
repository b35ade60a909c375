//! Credential and session store.
//!
//! Every operation takes the request's tenant subdomain, resolves it through
//! the routing table, and runs against that tenant's own pool and cache.
//! Sessions follow a cache-aside contract: the Redis entry is the
//! enforcement point for "is this session usable right now", the database
//! row is the durable source of truth for expiry, and a missing cache entry
//! is reconstructed from the row on demand.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use inkbase_core::config::AuthConfig;
use inkbase_core::time::unix_timestamp;

use crate::cache::CacheError;
use crate::storage::DatabaseError;
use crate::tenant::{TenantError, TenantRegistry, TenantResources};

use super::jwt::{JwtManager, TokenError};
use super::password;
use super::session::Session;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Covers both unknown users and wrong passwords so callers cannot
    /// enumerate accounts.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Refresh token expired or invalidated")]
    RefreshTokenExpired,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Session expired or invalidated")]
    SessionExpired,

    #[error("Action requires administrative privileges")]
    PermissionDenied,

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Session encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// A freshly issued access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in_secs: i64,
}

/// Result of a successful login: the token pair plus the id of the session
/// created alongside it.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub session_id: String,
}

/// Tenant-aware credential and session operations.
pub struct AuthService {
    registry: Arc<TenantRegistry>,
    jwt: Arc<JwtManager>,
    refresh_ttl_secs: i64,
    session_ttl_secs: i64,
}

impl AuthService {
    pub fn new(registry: Arc<TenantRegistry>, jwt: Arc<JwtManager>, config: &AuthConfig) -> Self {
        Self {
            registry,
            jwt,
            refresh_ttl_secs: config.refresh_ttl_secs,
            session_ttl_secs: config.session_ttl_secs,
        }
    }

    fn resolve(&self, tenant: &str) -> Result<&TenantResources, AuthError> {
        Ok(self.registry.get(tenant)?)
    }

    /// Authenticate a user and open a session.
    #[instrument(skip(self, email, password))]
    pub async fn login(
        &self,
        tenant: &str,
        email: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let resources = self.resolve(tenant)?;

        let user = match resources.db.get_user_by_email(email).await {
            Ok(user) => user,
            Err(DatabaseError::NotFound(_)) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        let valid = password::verify_password(password, &user.hashed_password)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        if !valid {
            warn!(tenant, "Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.issue_tokens(resources, &user.id, tenant, &user.role).await?;

        // Session: cache entry plus durable row. If the durable insert
        // fails the cached entry is removed again so the two never disagree
        // in the dangerous direction.
        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            session_id: session_id.clone(),
            user_id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            tenant: tenant.to_string(),
        };
        let payload = serde_json::to_string(&session)?;

        let expires_at = unix_timestamp() + self.session_ttl_secs;
        resources
            .cache
            .set(
                &session_id,
                &payload,
                Duration::from_secs(self.session_ttl_secs.unsigned_abs()),
            )
            .await?;

        if let Err(e) = resources
            .db
            .insert_session(&session_id, &user.id, expires_at)
            .await
        {
            if let Err(del_err) = resources.cache.delete(&session_id).await {
                warn!(error = %del_err, "Failed to roll back cached session");
            }
            return Err(e.into());
        }

        info!(tenant, user_id = %user.id, "User logged in");
        Ok(LoginOutcome { tokens, session_id })
    }

    /// Rotate a refresh token: issue a new pair, then invalidate the old
    /// token. The new token is inserted before the old one is touched, so a
    /// crash between the two steps never leaves zero valid tokens.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_session(
        &self,
        tenant: &str,
        refresh_token: &str,
    ) -> Result<TokenPair, AuthError> {
        let resources = self.resolve(tenant)?;

        let row = resources
            .db
            .get_refresh_token(refresh_token)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;
        if !row.is_active(unix_timestamp()) {
            return Err(AuthError::RefreshTokenExpired);
        }

        let user = resources.db.get_user(&row.user_id).await?;
        let tokens = self.issue_tokens(resources, &user.id, tenant, &user.role).await?;

        if let Err(e) = resources.db.invalidate_refresh_token(refresh_token).await {
            // Non-fatal: the new token is already live, the old one still
            // expires on its own schedule.
            warn!(tenant, error = %e, "Failed to invalidate rotated refresh token");
        }

        Ok(tokens)
    }

    /// End a session. Removing the cache entry is the required effect; the
    /// database row update is bookkeeping and only logged on failure.
    #[instrument(skip(self))]
    pub async fn logout(&self, tenant: &str, session_id: &str) -> Result<(), AuthError> {
        let resources = self.resolve(tenant)?;

        resources.cache.delete(session_id).await?;

        if let Err(e) = resources.db.invalidate_session(session_id).await {
            warn!(tenant, error = %e, "Failed to mark session row invalidated");
        }

        info!(tenant, "Session ended");
        Ok(())
    }

    /// Cache-aside session lookup with reconstruction from the database.
    #[instrument(skip(self))]
    pub async fn get_session(&self, tenant: &str, session_id: &str) -> Result<Session, AuthError> {
        let resources = self.resolve(tenant)?;

        match resources.cache.get(session_id).await {
            Ok(Some(payload)) => match serde_json::from_str::<Session>(&payload) {
                Ok(session) => return Ok(session),
                Err(e) => {
                    warn!(tenant, error = %e, "Corrupt cached session, rebuilding from database");
                }
            },
            Ok(None) => {}
            Err(e) => {
                warn!(tenant, error = %e, "Session cache read failed, falling back to database");
            }
        }

        let row = resources
            .db
            .get_session_row(session_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        let now = unix_timestamp();
        if !row.is_usable(now) {
            return Err(AuthError::SessionExpired);
        }

        let user = resources.db.get_user(&row.user_id).await?;
        let session = Session {
            session_id: session_id.to_string(),
            user_id: user.id,
            username: user.username,
            email: user.email,
            tenant: tenant.to_string(),
        };

        // Repopulate with the remaining validity, never longer than the
        // durable expiry. Failure to write back does not fail the read.
        let remaining = row.expires_at - now;
        if remaining > 0 {
            if let Ok(payload) = serde_json::to_string(&session) {
                if let Err(e) = resources
                    .cache
                    .set(session_id, &payload, Duration::from_secs(remaining.unsigned_abs()))
                    .await
                {
                    warn!(tenant, error = %e, "Failed to repopulate session cache");
                }
            }
        }

        Ok(session)
    }

    /// Validate a session and return its principal data. Alias for
    /// [`Self::get_session`] kept for transport-layer symmetry.
    pub async fn validate_session(
        &self,
        tenant: &str,
        session_id: &str,
    ) -> Result<Session, AuthError> {
        self.get_session(tenant, session_id).await
    }

    /// Create a new user account in the tenant's database.
    #[instrument(skip(self, email, password))]
    pub async fn register(
        &self,
        tenant: &str,
        username: &str,
        email: &str,
        password: &str,
        role: &str,
    ) -> Result<(), AuthError> {
        let resources = self.resolve(tenant)?;

        if resources.db.get_user_by_email(email).await.is_ok() {
            return Err(AuthError::UserExists(email.to_string()));
        }

        let studio = resources.db.get_studio(tenant).await?;
        let hash = password::hash_password(password)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        let user_id = Uuid::new_v4().to_string();
        resources
            .db
            .create_user(&user_id, &studio.id, username, email, &hash, role)
            .await?;

        info!(tenant, user_id = %user_id, "User registered");
        Ok(())
    }

    /// Change a user's password after re-verifying the current one. All
    /// outstanding refresh tokens are invalidated so other devices must
    /// re-authenticate.
    #[instrument(skip(self, email, old_password, new_password))]
    pub async fn change_password(
        &self,
        tenant: &str,
        email: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let resources = self.resolve(tenant)?;

        let user = match resources.db.get_user_by_email(email).await {
            Ok(user) => user,
            Err(DatabaseError::NotFound(_)) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        let valid = password::verify_password(old_password, &user.hashed_password)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        if !valid {
            return Err(AuthError::InvalidCredentials);
        }

        let new_hash = password::hash_password(new_password)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        resources.db.update_password(&user.id, &new_hash).await?;

        if let Err(e) = resources.db.invalidate_user_refresh_tokens(&user.id).await {
            warn!(tenant, error = %e, "Failed to invalidate refresh tokens after password change");
        }

        info!(tenant, user_id = %user.id, "Password changed");
        Ok(())
    }

    /// Change a user's email after re-verifying their password.
    #[instrument(skip(self, email, current_password, new_email))]
    pub async fn change_email(
        &self,
        tenant: &str,
        email: &str,
        current_password: &str,
        new_email: &str,
    ) -> Result<(), AuthError> {
        let resources = self.resolve(tenant)?;

        let user = match resources.db.get_user_by_email(email).await {
            Ok(user) => user,
            Err(DatabaseError::NotFound(_)) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };
        let valid = password::verify_password(current_password, &user.hashed_password)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        if !valid {
            return Err(AuthError::InvalidCredentials);
        }

        resources.db.update_email(&user.id, new_email).await?;
        info!(tenant, user_id = %user.id, "Email changed");
        Ok(())
    }

    /// Reset another user's password. The acting user must hold an
    /// administrative role; self-service goes through
    /// [`Self::change_password`].
    #[instrument(skip(self, new_password))]
    pub async fn admin_reset_password(
        &self,
        tenant: &str,
        acting_user_id: &str,
        target_user_id: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let resources = self.resolve(tenant)?;

        if acting_user_id == target_user_id {
            return Err(AuthError::PermissionDenied);
        }

        let acting = resources.db.get_user(acting_user_id).await?;
        if acting.role != "OWNER" && acting.role != "ADMIN" {
            return Err(AuthError::PermissionDenied);
        }

        let new_hash = password::hash_password(new_password)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        resources.db.update_password(target_user_id, &new_hash).await?;

        if let Err(e) = resources
            .db
            .invalidate_user_refresh_tokens(target_user_id)
            .await
        {
            warn!(tenant, error = %e, "Failed to invalidate refresh tokens after admin reset");
        }

        info!(tenant, target_user_id, "Password reset by admin");
        Ok(())
    }

    async fn issue_tokens(
        &self,
        resources: &TenantResources,
        user_id: &str,
        tenant: &str,
        role: &str,
    ) -> Result<TokenPair, AuthError> {
        let (access_token, expires_in_secs) =
            self.jwt.issue_access_token(user_id, tenant, role)?;

        let refresh_token = Uuid::new_v4().to_string();
        let refresh_expires = unix_timestamp() + self.refresh_ttl_secs;
        resources
            .db
            .insert_refresh_token(&refresh_token, user_id, refresh_expires)
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in_secs,
        })
    }
}
