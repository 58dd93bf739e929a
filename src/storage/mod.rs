//! Storage module for database and configuration.

pub mod config;
pub mod database;
pub mod schema;
pub mod store;

pub use config::{AppConfig, ConfigError, SessionSettings, StorageSettings};
pub use database::{Database, DatabaseError};
pub use store::SessionStore;
