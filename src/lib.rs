//! Libris Library Lending System
//!
//! A Rust REST API server for managing library users, books and loans,
//! enforcing the lending rules (loan limits, due dates, renewals and
//! overdue fines) on top of a MongoDB document store.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub db: mongodb::Database,
}
