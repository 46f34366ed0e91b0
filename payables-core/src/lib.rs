//! Multi-tenant accounts-payable core: bills, their status lifecycle,
//! recurrence expansion and per-company statistics.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod money;
pub mod recurrence;
pub mod service;
pub mod store;
pub mod sweeper;
pub mod validation;

pub use error::{PayablesError, Result};
