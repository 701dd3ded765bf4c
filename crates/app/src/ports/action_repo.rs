//! Action repository port: persistence for actions and their execution log.

use std::future::Future;

use gpiohub_domain::action::{Action, ExecutionLogEntry};
use gpiohub_domain::error::GpioHubError;
use gpiohub_domain::id::ActionId;
use gpiohub_domain::time::Timestamp;

/// Repository for persisting and querying [`Action`]s.
///
/// Steps are always returned in execution order (ascending delay, ties in
/// insertion order).
pub trait ActionRepository {
    /// Insert an action with its steps. Assigns `id` and timestamps.
    fn create(&self, action: Action) -> impl Future<Output = Result<Action, GpioHubError>> + Send;

    /// Get an action by its unique identifier.
    fn get_by_id(
        &self,
        id: ActionId,
    ) -> impl Future<Output = Result<Option<Action>, GpioHubError>> + Send;

    /// Get all actions, ordered by id.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Action>, GpioHubError>> + Send;

    /// Get all enabled actions, ordered by id.
    fn get_enabled(&self) -> impl Future<Output = Result<Vec<Action>, GpioHubError>> + Send;

    /// Replace the definition (name, kind, schedule, parameters, enabled, steps).
    ///
    /// `last_run` and `next_run` are left untouched. Fails with `NotFound`.
    fn update(&self, action: Action) -> impl Future<Output = Result<Action, GpioHubError>> + Send;

    /// Flip the enabled flag. Fails with `NotFound`.
    fn set_enabled(
        &self,
        id: ActionId,
        enabled: bool,
    ) -> impl Future<Output = Result<(), GpioHubError>> + Send;

    /// Delete an action, its steps and its log. Fails with `NotFound`.
    fn delete(&self, id: ActionId) -> impl Future<Output = Result<(), GpioHubError>> + Send;

    /// Stamp `last_run`. A missing action is not an error.
    fn record_run(
        &self,
        id: ActionId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), GpioHubError>> + Send;

    /// Store the next due time. A missing action is not an error.
    fn set_next_run(
        &self,
        id: ActionId,
        next_run: Option<Timestamp>,
    ) -> impl Future<Output = Result<(), GpioHubError>> + Send;

    /// Append one execution log entry, returning it with its assigned id.
    fn append_log(
        &self,
        entry: ExecutionLogEntry,
    ) -> impl Future<Output = Result<ExecutionLogEntry, GpioHubError>> + Send;

    /// Most recent log entries for an action, newest first.
    fn get_logs(
        &self,
        id: ActionId,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<ExecutionLogEntry>, GpioHubError>> + Send;
}
