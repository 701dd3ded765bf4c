//! `SQLite` implementation of [`DeviceRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use gpiohub_app::ports::DeviceRepository;
use gpiohub_domain::device::{Device, DeviceState};
use gpiohub_domain::error::{GpioHubError, NotFoundError, ValidationError};
use gpiohub_domain::id::DeviceId;
use gpiohub_domain::time::{self, Timestamp};

use crate::error::{StorageError, decode};

/// Wrapper for converting database rows into domain [`Device`].
struct Wrapper(Device);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Device> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: i64 = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let icon: String = row.try_get("icon")?;
        let pin: i64 = row.try_get("pin_number")?;
        let state: String = row.try_get("state")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Self(Device {
            id: DeviceId::new(id),
            name,
            icon,
            pin: u8::try_from(pin).map_err(decode)?,
            state: DeviceState::from_str(&state).map_err(decode)?,
            created_at: Some(time::parse_storage_string(&created_at).map_err(decode)?),
            updated_at: Some(time::parse_storage_string(&updated_at).map_err(decode)?),
        }))
    }
}

const INSERT: &str = "INSERT INTO devices (name, icon, pin_number, state, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)";
const CLAIM_PIN: &str = "UPDATE gpio_pins SET is_used = 1 WHERE pin_number = ?";
const RELEASE_PIN: &str = "UPDATE gpio_pins SET is_used = 0 WHERE pin_number = ?";
const SELECT_BY_ID: &str = "SELECT * FROM devices WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM devices ORDER BY id";
const UPDATE_STATE: &str = "UPDATE devices SET state = ?, updated_at = ? WHERE id = ?";
const DELETE_BY_ID: &str = "DELETE FROM devices WHERE id = ? RETURNING pin_number";

/// `SQLite`-backed device repository.
#[derive(Clone)]
pub struct SqliteDeviceRepository {
    pool: SqlitePool,
}

impl SqliteDeviceRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn not_found(id: DeviceId) -> GpioHubError {
    NotFoundError {
        entity: "Device",
        id: id.to_string(),
    }
    .into()
}

/// Turn constraint violations on insert into the matching validation error.
fn insert_error(err: sqlx::Error, pin: u8) -> GpioHubError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return ValidationError::PinInUse(pin).into();
        }
        if db.is_foreign_key_violation() {
            return ValidationError::UnknownPin(pin).into();
        }
    }
    StorageError::from(err).into()
}

impl DeviceRepository for SqliteDeviceRepository {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, GpioHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let now = time::now();
            let stamp = time::to_storage_string(now);

            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let id = sqlx::query(INSERT)
                .bind(&device.name)
                .bind(&device.icon)
                .bind(i64::from(device.pin))
                .bind(device.state.as_str())
                .bind(&stamp)
                .bind(&stamp)
                .execute(&mut *tx)
                .await
                .map_err(|err| insert_error(err, device.pin))?
                .last_insert_rowid();
            sqlx::query(CLAIM_PIN)
                .bind(i64::from(device.pin))
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            tx.commit().await.map_err(StorageError::from)?;

            Ok(Device {
                id: DeviceId::new(id),
                created_at: Some(now),
                updated_at: Some(now),
                ..device
            })
        }
    }

    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, GpioHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.get())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, GpioHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn update_state(
        &self,
        id: DeviceId,
        state: DeviceState,
        at: Timestamp,
    ) -> impl Future<Output = Result<Device, GpioHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let updated = sqlx::query(UPDATE_STATE)
                .bind(state.as_str())
                .bind(time::to_storage_string(at))
                .bind(id.get())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?
                .rows_affected();
            if updated == 0 {
                return Err(not_found(id));
            }

            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.get())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;
            Wrapper::maybe(row).ok_or_else(|| not_found(id))
        }
    }

    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<(), GpioHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let pin: Option<(i64,)> = sqlx::query_as(DELETE_BY_ID)
                .bind(id.get())
                .fetch_optional(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            let Some((pin,)) = pin else {
                return Err(not_found(id));
            };
            sqlx::query(RELEASE_PIN)
                .bind(pin)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            tx.commit().await.map_err(StorageError::from)?;

            Ok(())
        }
    }
}
