//! Database queries against one tenant's database.
//!
//! Every method runs on the pool owned by a single [`TenantDatabase`], so
//! isolation between tenants is structural: a query can only ever touch the
//! database the handle was opened against.

use inkbase_core::time::unix_timestamp;

use super::db::{DatabaseError, TenantDatabase};
use super::models::{RefreshTokenRow, SessionRow, Studio, User};

impl TenantDatabase {
    // =========================================================================
    // User queries
    // =========================================================================

    /// Create a new user.
    pub async fn create_user(
        &self,
        id: &str,
        studio_id: &str,
        username: &str,
        email: &str,
        hashed_password: &str,
        role: &str,
    ) -> Result<User, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO users (id, studio_id, username, email, hashed_password, role, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(studio_id)
        .bind(username)
        .bind(email)
        .bind(hashed_password)
        .bind(role)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_user(id).await
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User {id}")))
    }

    /// Get a user by email.
    pub async fn get_user_by_email(&self, email: &str) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User with email {email}")))
    }

    /// Replace a user's password hash.
    pub async fn update_password(&self, user_id: &str, new_hash: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE users SET hashed_password = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(new_hash)
        .bind(unix_timestamp())
        .bind(user_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("User {user_id}")));
        }
        Ok(())
    }

    /// Replace a user's email address.
    pub async fn update_email(&self, user_id: &str, new_email: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE users SET email = $1, updated_at = $2 WHERE id = $3")
            .bind(new_email)
            .bind(unix_timestamp())
            .bind(user_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("User {user_id}")));
        }
        Ok(())
    }

    // =========================================================================
    // Studio queries
    // =========================================================================

    /// Number of studio rows. A tenant database holds exactly one after
    /// bootstrap; zero means bootstrap has not run yet.
    pub async fn studio_count(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM studios")
            .fetch_one(self.pool())
            .await?;
        Ok(row.0)
    }

    /// Get the studio row by subdomain.
    pub async fn get_studio(&self, subdomain: &str) -> Result<Studio, DatabaseError> {
        sqlx::query_as::<_, Studio>("SELECT * FROM studios WHERE subdomain = $1")
            .bind(subdomain)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Studio {subdomain}")))
    }

    /// Insert the studio row and its owner account atomically. Used only by
    /// tenant bootstrap, after confirming the studios table is empty.
    pub async fn insert_studio_and_owner(
        &self,
        studio: &Studio,
        owner: &User,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO studios (id, subdomain, name, address, phone, email, website, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&studio.id)
        .bind(&studio.subdomain)
        .bind(&studio.name)
        .bind(&studio.address)
        .bind(&studio.phone)
        .bind(&studio.email)
        .bind(&studio.website)
        .bind(studio.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO users (id, studio_id, username, email, hashed_password, role, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&owner.id)
        .bind(&owner.studio_id)
        .bind(&owner.username)
        .bind(&owner.email)
        .bind(&owner.hashed_password)
        .bind(&owner.role)
        .bind(owner.created_at)
        .bind(owner.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Session queries
    // =========================================================================

    /// Record a new session.
    pub async fn insert_session(
        &self,
        session_id: &str,
        user_id: &str,
        expires_at: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO sessions (session_id, user_id, created_at, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(unix_timestamp())
        .bind(expires_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Fetch a session row by id, whether or not it is still usable.
    pub async fn get_session_row(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionRow>, DatabaseError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM sessions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Mark a session row invalidated.
    pub async fn invalidate_session(&self, session_id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE sessions SET invalidated_at = $1 WHERE session_id = $2 AND invalidated_at IS NULL",
        )
        .bind(unix_timestamp())
        .bind(session_id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Refresh token queries
    // =========================================================================

    /// Store a refresh token bound to a user.
    pub async fn insert_refresh_token(
        &self,
        token: &str,
        user_id: &str,
        expires_at: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (token, user_id, created_at, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(token)
        .bind(user_id)
        .bind(unix_timestamp())
        .bind(expires_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Fetch a refresh token row, whether or not it is still active.
    pub async fn get_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshTokenRow>, DatabaseError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            "SELECT * FROM refresh_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Mark one refresh token invalidated.
    pub async fn invalidate_refresh_token(&self, token: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET invalidated_at = $1 WHERE token = $2 AND invalidated_at IS NULL",
        )
        .bind(unix_timestamp())
        .bind(token)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark all of a user's active refresh tokens invalidated. Returns the
    /// number of tokens affected.
    pub async fn invalidate_user_refresh_tokens(
        &self,
        user_id: &str,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET invalidated_at = $1 WHERE user_id = $2 AND invalidated_at IS NULL",
        )
        .bind(unix_timestamp())
        .bind(user_id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}
