//! `SQLite` implementation of [`ActionRepository`].
//!
//! An action spans three tables: `actions` holds the definition and the
//! scheduler's bookkeeping, `action_devices` its steps, and `action_logs`
//! the append-only execution log. Steps and logs are removed with their
//! action through `ON DELETE CASCADE`.

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, Sqlite, SqlitePool, Transaction};

use gpiohub_app::ports::ActionRepository;
use gpiohub_domain::action::{
    Action, ActionKind, DeviceStep, ExecutionLogEntry, ExecutionStatus, StepType,
};
use gpiohub_domain::error::{GpioHubError, NotFoundError};
use gpiohub_domain::id::{ActionId, DeviceId};
use gpiohub_domain::time::{self, Timestamp};

use crate::error::{StorageError, decode};

fn parse_time(value: &str) -> Result<Timestamp, sqlx::Error> {
    time::parse_storage_string(value).map_err(decode)
}

fn parse_optional_time(value: Option<String>) -> Result<Option<Timestamp>, sqlx::Error> {
    value.as_deref().map(parse_time).transpose()
}

/// An action row without its steps.
struct Wrapper(Action);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: i64 = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let kind: String = row.try_get("kind")?;
        let schedule: String = row.try_get("schedule")?;
        let parameters: String = row.try_get("parameters")?;
        let enabled: bool = row.try_get("enabled")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;
        let last_run: Option<String> = row.try_get("last_run")?;
        let next_run: Option<String> = row.try_get("next_run")?;

        Ok(Self(Action {
            id: ActionId::new(id),
            name,
            kind: ActionKind::from_str(&kind).map_err(decode)?,
            schedule,
            parameters: serde_json::from_str(&parameters).map_err(decode)?,
            enabled,
            steps: Vec::new(),
            created_at: Some(parse_time(&created_at)?),
            updated_at: Some(parse_time(&updated_at)?),
            last_run: parse_optional_time(last_run)?,
            next_run: parse_optional_time(next_run)?,
        }))
    }
}

struct StepRow {
    action_id: ActionId,
    step: DeviceStep,
}

impl<'r> FromRow<'r, SqliteRow> for StepRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let action_id: i64 = row.try_get("action_id")?;
        let device_id: i64 = row.try_get("device_id")?;
        let action_type: String = row.try_get("action_type")?;
        let delay_seconds: i64 = row.try_get("delay_seconds")?;

        Ok(Self {
            action_id: ActionId::new(action_id),
            step: DeviceStep::new(
                DeviceId::new(device_id),
                StepType::from_str(&action_type).map_err(decode)?,
                u32::try_from(delay_seconds).map_err(decode)?,
            ),
        })
    }
}

struct LogRow(ExecutionLogEntry);

impl<'r> FromRow<'r, SqliteRow> for LogRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: i64 = row.try_get("id")?;
        let action_id: i64 = row.try_get("action_id")?;
        let status: String = row.try_get("status")?;
        let message: String = row.try_get("message")?;
        let executed_at: String = row.try_get("executed_at")?;

        Ok(Self(ExecutionLogEntry {
            id,
            action_id: ActionId::new(action_id),
            status: ExecutionStatus::from_str(&status).map_err(decode)?,
            message,
            executed_at: parse_time(&executed_at)?,
        }))
    }
}

const INSERT: &str = "INSERT INTO actions (name, kind, schedule, parameters, enabled, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)";
const INSERT_STEP: &str = "INSERT INTO action_devices (action_id, device_id, action_type, delay_seconds) VALUES (?, ?, ?, ?)";
const SELECT_BY_ID: &str = "SELECT * FROM actions WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM actions ORDER BY id";
const SELECT_ENABLED: &str = "SELECT * FROM actions WHERE enabled = 1 ORDER BY id";
const SELECT_STEPS: &str =
    "SELECT * FROM action_devices WHERE action_id = ? ORDER BY delay_seconds, id";
const SELECT_ALL_STEPS: &str = "SELECT * FROM action_devices ORDER BY action_id, delay_seconds, id";
const UPDATE: &str = "UPDATE actions SET name = ?, kind = ?, schedule = ?, parameters = ?, enabled = ?, updated_at = ? WHERE id = ?";
const DELETE_STEPS: &str = "DELETE FROM action_devices WHERE action_id = ?";
const SET_ENABLED: &str = "UPDATE actions SET enabled = ?, updated_at = ? WHERE id = ?";
const DELETE_BY_ID: &str = "DELETE FROM actions WHERE id = ?";
const SET_LAST_RUN: &str = "UPDATE actions SET last_run = ? WHERE id = ?";
const SET_NEXT_RUN: &str = "UPDATE actions SET next_run = ? WHERE id = ?";
const INSERT_LOG: &str =
    "INSERT INTO action_logs (action_id, status, message, executed_at) VALUES (?, ?, ?, ?)";
const SELECT_LOGS: &str = "SELECT * FROM action_logs WHERE action_id = ? ORDER BY id DESC LIMIT ?";

/// `SQLite`-backed action repository.
#[derive(Clone)]
pub struct SqliteActionRepository {
    pool: SqlitePool,
}

impl SqliteActionRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load(&self, id: ActionId) -> Result<Option<Action>, GpioHubError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        let Some(Wrapper(mut action)) = row else {
            return Ok(None);
        };
        let steps: Vec<StepRow> = sqlx::query_as(SELECT_STEPS)
            .bind(id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        action.steps = steps.into_iter().map(|row| row.step).collect();
        Ok(Some(action))
    }

    async fn load_many(&self, query: &'static str) -> Result<Vec<Action>, GpioHubError> {
        let rows: Vec<Wrapper> = sqlx::query_as(query)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        let steps: Vec<StepRow> = sqlx::query_as(SELECT_ALL_STEPS)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let mut by_action: HashMap<ActionId, Vec<DeviceStep>> = HashMap::new();
        for row in steps {
            by_action.entry(row.action_id).or_default().push(row.step);
        }
        Ok(rows
            .into_iter()
            .map(|Wrapper(mut action)| {
                action.steps = by_action.remove(&action.id).unwrap_or_default();
                action
            })
            .collect())
    }

    async fn reload(&self, id: ActionId) -> Result<Action, GpioHubError> {
        self.load(id).await?.ok_or_else(|| not_found(id))
    }
}

fn not_found(id: ActionId) -> GpioHubError {
    NotFoundError {
        entity: "Action",
        id: id.to_string(),
    }
    .into()
}

async fn insert_steps(
    tx: &mut Transaction<'_, Sqlite>,
    id: ActionId,
    steps: &[DeviceStep],
) -> Result<(), StorageError> {
    for step in steps {
        sqlx::query(INSERT_STEP)
            .bind(id.get())
            .bind(step.device_id.get())
            .bind(step.action_type.as_str())
            .bind(i64::from(step.delay_seconds))
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

impl ActionRepository for SqliteActionRepository {
    fn create(&self, action: Action) -> impl Future<Output = Result<Action, GpioHubError>> + Send {
        async move {
            let stamp = time::to_storage_string(time::now());
            let parameters = serde_json::to_string(&action.parameters).map_err(StorageError::from)?;

            let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
            let id = sqlx::query(INSERT)
                .bind(&action.name)
                .bind(action.kind.as_str())
                .bind(&action.schedule)
                .bind(&parameters)
                .bind(action.enabled)
                .bind(&stamp)
                .bind(&stamp)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?
                .last_insert_rowid();
            let id = ActionId::new(id);
            insert_steps(&mut tx, id, &action.ordered_steps()).await?;
            tx.commit().await.map_err(StorageError::from)?;

            self.reload(id).await
        }
    }

    fn get_by_id(
        &self,
        id: ActionId,
    ) -> impl Future<Output = Result<Option<Action>, GpioHubError>> + Send {
        self.load(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Action>, GpioHubError>> + Send {
        self.load_many(SELECT_ALL)
    }

    fn get_enabled(&self) -> impl Future<Output = Result<Vec<Action>, GpioHubError>> + Send {
        self.load_many(SELECT_ENABLED)
    }

    fn update(&self, action: Action) -> impl Future<Output = Result<Action, GpioHubError>> + Send {
        async move {
            let parameters = serde_json::to_string(&action.parameters).map_err(StorageError::from)?;

            let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
            let updated = sqlx::query(UPDATE)
                .bind(&action.name)
                .bind(action.kind.as_str())
                .bind(&action.schedule)
                .bind(&parameters)
                .bind(action.enabled)
                .bind(time::to_storage_string(time::now()))
                .bind(action.id.get())
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?
                .rows_affected();
            if updated == 0 {
                return Err(not_found(action.id));
            }
            sqlx::query(DELETE_STEPS)
                .bind(action.id.get())
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            insert_steps(&mut tx, action.id, &action.ordered_steps()).await?;
            tx.commit().await.map_err(StorageError::from)?;

            self.reload(action.id).await
        }
    }

    fn set_enabled(
        &self,
        id: ActionId,
        enabled: bool,
    ) -> impl Future<Output = Result<(), GpioHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let updated = sqlx::query(SET_ENABLED)
                .bind(enabled)
                .bind(time::to_storage_string(time::now()))
                .bind(id.get())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?
                .rows_affected();
            if updated == 0 {
                return Err(not_found(id));
            }
            Ok(())
        }
    }

    fn delete(&self, id: ActionId) -> impl Future<Output = Result<(), GpioHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let deleted = sqlx::query(DELETE_BY_ID)
                .bind(id.get())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?
                .rows_affected();
            if deleted == 0 {
                return Err(not_found(id));
            }
            Ok(())
        }
    }

    fn record_run(
        &self,
        id: ActionId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), GpioHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(SET_LAST_RUN)
                .bind(time::to_storage_string(at))
                .bind(id.get())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(())
        }
    }

    fn set_next_run(
        &self,
        id: ActionId,
        next_run: Option<Timestamp>,
    ) -> impl Future<Output = Result<(), GpioHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(SET_NEXT_RUN)
                .bind(next_run.map(time::to_storage_string))
                .bind(id.get())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(())
        }
    }

    fn append_log(
        &self,
        entry: ExecutionLogEntry,
    ) -> impl Future<Output = Result<ExecutionLogEntry, GpioHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let id = sqlx::query(INSERT_LOG)
                .bind(entry.action_id.get())
                .bind(entry.status.as_str())
                .bind(&entry.message)
                .bind(time::to_storage_string(entry.executed_at))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?
                .last_insert_rowid();
            Ok(ExecutionLogEntry { id, ..entry })
        }
    }

    fn get_logs(
        &self,
        id: ActionId,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<ExecutionLogEntry>, GpioHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<LogRow> = sqlx::query_as(SELECT_LOGS)
                .bind(id.get())
                .bind(i64::from(limit))
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(rows.into_iter().map(|row| row.0).collect())
        }
    }
}
