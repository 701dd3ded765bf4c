//! `SQLite` connection pool setup, migration runner and pin catalog seeding.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use gpiohub_domain::pin;

use crate::error::StorageError;

const SEED_PIN: &str = "INSERT OR IGNORE INTO gpio_pins (pin_number, type, category, capabilities, description, is_used) VALUES (?, ?, ?, ?, ?, 0)";

/// Configuration for the `SQLite` storage adapter.
pub struct Config {
    /// `SQLite` connection URL (e.g. `sqlite:gpiohub.db` or `sqlite::memory:`).
    pub database_url: String,
}

impl Config {
    /// Build a [`Database`] from this configuration.
    ///
    /// Creates the connection pool, creates the database file if missing,
    /// runs all pending migrations and seeds the pin catalog.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the connection, migrations or seeding fail.
    pub async fn build(self) -> Result<Database, StorageError> {
        Database::initialize(&self.database_url).await
    }
}

/// Holds the `SQLite` connection pool and provides access to it.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn initialize(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // every connection to `:memory:` is its own database, so keep exactly one alive
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePool::connect_with(options).await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        let seeded = seed_pins(&pool).await?;
        tracing::debug!(seeded, "pin catalog ready");

        Ok(Self { pool })
    }

    /// Borrow the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Insert any header pin the table does not know yet. Returns how many were added.
async fn seed_pins(pool: &SqlitePool) -> Result<u64, StorageError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;
    for p in pin::header_catalog() {
        let capabilities = serde_json::to_string(&p.capabilities)?;
        inserted += sqlx::query(SEED_PIN)
            .bind(i64::from(p.pin_number))
            .bind(p.pin_type.as_str())
            .bind(&p.category)
            .bind(&capabilities)
            .bind(&p.description)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }
    tx.commit().await?;
    Ok(inserted)
}
