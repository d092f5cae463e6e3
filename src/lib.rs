pub mod actions;
pub mod auth;
pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod openapi;
pub mod repo;
pub mod routes;
pub mod webhook;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
