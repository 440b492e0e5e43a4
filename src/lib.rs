// Tweetline - social feed backend over a JSON document store

// HTTP surface - router and handlers
pub mod api;

// Application wiring
pub mod app_state;
pub mod config;

// Identity resolution collaborator
pub mod auth;

// Persistence - document collections over SQLite
pub mod store;

// Data model - tweets, users, notifications
pub mod models;

// Read side - projections and aggregation
pub mod views;

// Write side - mutations and notification fan-out
pub mod services;

// Common utilities
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
