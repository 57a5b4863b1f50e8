//! Revu Common Library
//!
//! Shared code for the Revu review platform:
//! - Database models and repository patterns
//! - Error types and handling
//! - Configuration management
//! - Authentication (confirmation codes, JWT)
//! - Confirmation notification dispatch
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod notify;

// Re-export commonly used types
pub use auth::{AuthService, JwtManager};
pub use config::AppConfig;
pub use db::Repository;
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
