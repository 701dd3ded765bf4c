//! # gpiohub-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence for devices, the GPIO pin catalog, actions and their
//! execution log. Implements the repository ports from `gpiohub-app`.
//!
//! The schema lives in `migrations/` and is embedded at compile time with
//! `sqlx::migrate!`. The 40-pin header catalog is seeded on every start with
//! `INSERT OR IGNORE`, so existing `is_used` flags survive restarts.

mod error;

pub mod action_repo;
pub mod device_repo;
pub mod pin_repo;
pub mod pool;

pub use action_repo::SqliteActionRepository;
pub use device_repo::SqliteDeviceRepository;
pub use error::StorageError;
pub use pin_repo::SqlitePinRepository;
pub use pool::{Config, Database};
