//! Postgres storage for the Inkbase server.
//!
//! Provides per-tenant connection pools, the hash-checked migration runner,
//! and queries for users, studios, sessions, and refresh tokens.

mod db;
mod migrate;
mod models;
mod queries;

pub use db::{DatabaseError, TenantDatabase, connect_admin, ensure_database, wait_for_db};
pub use migrate::{MIGRATIONS, migrate};
pub use models::*;
