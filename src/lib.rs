pub mod classifier;
pub mod config;
pub mod fetcher;
pub mod models;
pub mod monitor;
pub mod notifier;
pub mod store;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
