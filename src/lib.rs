pub mod app;
pub mod auth;
pub mod backend;
pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod integrations;
pub mod inventory;
pub mod middleware;
pub mod models;
pub mod payroll;
pub mod services;

pub use app::{build_router, AppState};
