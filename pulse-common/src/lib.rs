//! # Pulse Common Library
//!
//! Shared code for the Pulse learning-management backend:
//! - Database models, schema and migrations
//! - Assignment risk classification and progress transitions
//! - Session tokens and password handling
//! - Configuration loading
//! - Utility functions

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod progress;
pub mod risk;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use risk::{RiskLevel, RiskTally};
