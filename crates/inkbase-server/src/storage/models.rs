//! Data models for Inkbase tenant storage.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub studio_id: String,
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub role: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Studio {
    pub id: String,
    pub subdomain: String,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub created_at: i64,
}

/// Durable session record. The cache holds a derived [`crate::auth::Session`]
/// value; this row decides whether a session is still valid.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionRow {
    pub session_id: String,
    pub user_id: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub invalidated_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefreshTokenRow {
    pub token: String,
    pub user_id: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub invalidated_at: Option<i64>,
}

impl SessionRow {
    pub fn is_usable(&self, now: i64) -> bool {
        self.invalidated_at.is_none() && self.expires_at > now
    }
}

impl RefreshTokenRow {
    pub fn is_active(&self, now: i64) -> bool {
        self.invalidated_at.is_none() && self.expires_at > now
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn session_usability() {
        let mut row = SessionRow {
            session_id: "s1".to_string(),
            user_id: "u1".to_string(),
            created_at: 100,
            expires_at: 200,
            invalidated_at: None,
        };
        assert!(row.is_usable(150));
        assert!(!row.is_usable(200));

        row.invalidated_at = Some(150);
        assert!(!row.is_usable(150));
    }

    #[test]
    fn refresh_token_activity() {
        let mut row = RefreshTokenRow {
            token: "t1".to_string(),
            user_id: "u1".to_string(),
            created_at: 100,
            expires_at: 200,
            invalidated_at: None,
        };
        assert!(row.is_active(199));
        assert!(!row.is_active(201));

        row.invalidated_at = Some(120);
        assert!(!row.is_active(150));
    }
}
