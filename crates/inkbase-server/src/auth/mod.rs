//! Authentication for the Inkbase server.
//!
//! Provides JWT access tokens, password hashing, and the tenant-aware
//! credential and session store.

pub mod claims;
pub mod jwt;
pub mod password;
pub mod service;
pub mod session;

pub use claims::{Claims, Principal};
pub use jwt::JwtManager;
pub use service::{AuthError, AuthService, LoginOutcome, TokenPair};
pub use session::Session;
