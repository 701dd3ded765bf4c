//! `SQLite` implementation of [`PinRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use gpiohub_app::ports::PinRepository;
use gpiohub_domain::error::GpioHubError;
use gpiohub_domain::pin::{GpioPin, PinType};

use crate::error::{StorageError, decode};

struct Wrapper(GpioPin);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let pin_number: i64 = row.try_get("pin_number")?;
        let pin_type: String = row.try_get("type")?;
        let category: String = row.try_get("category")?;
        let capabilities: String = row.try_get("capabilities")?;
        let description: String = row.try_get("description")?;
        let is_used: bool = row.try_get("is_used")?;

        Ok(Self(GpioPin {
            pin_number: u8::try_from(pin_number).map_err(decode)?,
            pin_type: PinType::from_str(&pin_type).map_err(decode)?,
            category,
            capabilities: serde_json::from_str(&capabilities).map_err(decode)?,
            description,
            is_used,
        }))
    }
}

const SELECT_BY_NUMBER: &str = "SELECT * FROM gpio_pins WHERE pin_number = ?";
const SELECT_ALL: &str = "SELECT * FROM gpio_pins ORDER BY pin_number";
const SELECT_USABLE: &str =
    "SELECT * FROM gpio_pins WHERE type = 'gpio' AND is_used = 0 ORDER BY pin_number";

/// `SQLite`-backed view of the header pin catalog.
#[derive(Clone)]
pub struct SqlitePinRepository {
    pool: SqlitePool,
}

impl SqlitePinRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_all(&self, query: &'static str) -> Result<Vec<GpioPin>, GpioHubError> {
        let rows: Vec<Wrapper> = sqlx::query_as(query)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

impl PinRepository for SqlitePinRepository {
    fn get(
        &self,
        pin_number: u8,
    ) -> impl Future<Output = Result<Option<GpioPin>, GpioHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_NUMBER)
                .bind(i64::from(pin_number))
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(row.map(|w| w.0))
        }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<GpioPin>, GpioHubError>> + Send {
        self.fetch_all(SELECT_ALL)
    }

    fn get_usable(&self) -> impl Future<Output = Result<Vec<GpioPin>, GpioHubError>> + Send {
        self.fetch_all(SELECT_USABLE)
    }
}
