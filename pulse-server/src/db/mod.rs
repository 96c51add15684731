//! Repository functions, one module per collection
//!
//! Each function takes the pool (or an executor inside a transaction) and
//! returns [`pulse_common::Result`]; authorization happens in the handlers.

pub mod activities;
pub mod assignments;
pub mod companies;
pub mod courses;
pub mod inquiries;
pub mod memberships;
pub mod notifications;
pub mod outbox;
pub mod tokens;
pub mod users;
