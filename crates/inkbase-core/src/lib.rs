//! Inkbase Core Library
//!
//! Shared functionality for Inkbase components:
//! - Deployment and tenant configuration loading
//! - Common error types
//! - Tracing initialisation
//! - Time helpers

pub mod config;
pub mod error;
pub mod time;
pub mod tracing_init;

pub use config::{AppConfig, TenantConfig};
pub use error::{Error, Result};
