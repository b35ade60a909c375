//! Inkbase Server Library
//!
//! Core functionality for the Inkbase multi-tenant studio backend:
//! - Postgres storage with a hash-checked migration runner
//! - Tenant resource manager and startup-built routing table
//! - Redis-backed session cache with tenant key prefixes
//! - Credential and session store (login, refresh rotation, logout)

pub mod auth;
pub mod cache;
pub mod storage;
pub mod tenant;
