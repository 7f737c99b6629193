// Library root for postboard

pub mod access;
pub mod auth;
pub mod cache;
pub mod config;
pub mod csrf;
pub mod db;
pub mod error;
pub mod handlers;
pub mod media;
pub mod memory;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod state;
pub mod store;
pub mod templates;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use db::Database;
pub use error::AppError;
pub use memory::MemoryStore;
pub use models::{Comment, Follow, Group, Post, User};
pub use routes::create_router;
pub use state::{AppState, SharedState};
pub use store::{PostScope, Store};
