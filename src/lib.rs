//! Mira engine library crate
//!
//! Re-exports core modules for integration tests and external use.

pub mod recommendation;
pub mod usage;
pub mod persona;
pub mod config;
pub mod database;
pub mod error;

// Re-export commonly used types
pub use recommendation::*;
pub use usage::cost::{calculate_token_cost, CostBreakdown};
pub use usage::routing::{model_for_user, normalize_model_id};
pub use config::Config;
pub use database::Database;
pub use error::Result;
