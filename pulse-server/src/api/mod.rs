//! HTTP API handlers for pulse-server

pub mod account;
pub mod admin;
pub mod assignments;
pub mod auth;
pub mod company;
pub mod courses;
pub mod demo;
pub mod employee;
pub mod health;
pub mod notifications;

pub use auth::auth_middleware;
pub use health::health_routes;
