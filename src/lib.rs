// Postboard - social blogging backend with composed, paginated feeds

// Core types and primitives
pub mod core;

// Persisted entities and read models
pub mod models;

// Persistence, caching and request identity
pub mod infrastructure;

// Feed composition, relationships and mutation handlers
pub mod services;

// HTTP routes
pub mod api;

pub mod app_state;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use app_state::AppState;
pub use error::{AppError, AppResult};
