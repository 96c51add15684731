//! API module for shared HTTP API functionality
//!
//! Session tokens, password handling and response types used by the server.
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP framework dependencies)
//! - Database operations (via sqlx)
//! - Shared types
//!
//! pulse-server wraps these with axum middleware and extractors.

pub mod auth;
pub mod password;
pub mod types;

pub use auth::{
    digest_token, generate_token, issue_session_token, load_session_secret, verify_session_token,
    SessionClaims, TokenError,
};
pub use password::{hash_password, validate_password_strength, verify_password};
pub use types::{ErrorResponse, MessageResponse};
