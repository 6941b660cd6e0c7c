//! Tenantry Core - multi-tenant business backend
//!
//! Resolves the tenant each request acts on, authorizes capabilities against
//! per-tenant role permissions and subscription features, and meters SMS
//! credits through an append-only ledger.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod migration;
pub mod repository;
pub mod server;
pub mod service;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
