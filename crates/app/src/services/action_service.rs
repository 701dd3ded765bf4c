//! Action service: use-cases for managing and running actions.
//!
//! Keeps the store and the scheduler's job table in step: every write that
//! changes an action's schedule or enabled flag re-arms or disarms its job.
//! Writes to one action are serialised, so the stored `enabled` flag and the
//! job table cannot drift apart under concurrent requests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

use gpiohub_domain::action::{Action, ExecutionLogEntry};
use gpiohub_domain::error::{GpioHubError, NotFoundError, ValidationError};
use gpiohub_domain::id::ActionId;
use gpiohub_domain::schedule;
use gpiohub_domain::time::Timestamp;

use crate::clock::Clock;
use crate::ports::{ActionRepository, DeviceRepository, OutputLines};
use crate::scheduler::{ActionScheduler, SchedulerStatus};

/// Default number of log entries returned by [`ActionService::logs`].
pub const DEFAULT_LOG_LIMIT: u32 = 50;

pub struct ActionService<AR, DR, L> {
    actions: AR,
    devices: DR,
    scheduler: ActionScheduler<AR, DR, L>,
    clock: Clock,
    write_locks: Mutex<HashMap<ActionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<AR, DR, L> ActionService<AR, DR, L>
where
    AR: ActionRepository + Send + Sync + 'static,
    DR: DeviceRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    pub fn new(actions: AR, devices: DR, scheduler: ActionScheduler<AR, DR, L>, clock: Clock) -> Self {
        Self {
            actions,
            devices,
            scheduler,
            clock,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn scheduler(&self) -> &ActionScheduler<AR, DR, L> {
        &self.scheduler
    }

    /// Validate, persist and (if enabled) schedule a new action.
    ///
    /// # Errors
    ///
    /// - [`GpioHubError::Validation`] for a bad definition or unknown device
    /// - [`GpioHubError::Schedule`] when the schedule does not parse
    /// - a storage error from the repository
    #[tracing::instrument(skip(self, action), fields(action_name = %action.name, kind = %action.kind))]
    pub async fn create_action(&self, mut action: Action) -> Result<Action, GpioHubError> {
        self.check_definition(&action).await?;
        action.steps = action.ordered_steps();

        let mut created = self.actions.create(action).await?;
        let _guard = self.lock_action(created.id).await;
        tracing::info!(action_id = %created.id, "action created");
        if created.enabled {
            created.next_run = self.scheduler.schedule_action(&created).await;
        }
        Ok(created)
    }

    /// Look up an action by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`GpioHubError::NotFound`] when no action with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_action(&self, id: ActionId) -> Result<Action, GpioHubError> {
        self.actions.get_by_id(id).await?.ok_or_else(|| not_found(id))
    }

    /// List all actions.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_actions(&self) -> Result<Vec<Action>, GpioHubError> {
        self.actions.get_all().await
    }

    /// Replace an action's definition and re-arm its job.
    ///
    /// # Errors
    ///
    /// Same as [`create_action`](Self::create_action), plus
    /// [`GpioHubError::NotFound`] when the action does not exist.
    #[tracing::instrument(skip(self, action))]
    pub async fn update_action(&self, id: ActionId, mut action: Action) -> Result<Action, GpioHubError> {
        self.check_definition(&action).await?;
        action.id = id;
        action.steps = action.ordered_steps();

        let _guard = self.lock_action(id).await;
        let mut updated = self.actions.update(action).await?;
        tracing::info!(action_id = %id, "action updated");
        updated.next_run = self.reschedule(&updated).await;
        Ok(updated)
    }

    /// Flip `enabled`, arming or disarming the job accordingly.
    ///
    /// # Errors
    ///
    /// Returns [`GpioHubError::NotFound`] when the action does not exist, or
    /// a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_action(&self, id: ActionId) -> Result<Action, GpioHubError> {
        let _guard = self.lock_action(id).await;
        let mut action = self.get_action(id).await?;
        action.enabled = !action.enabled;
        self.actions.set_enabled(id, action.enabled).await?;
        tracing::info!(action_id = %id, enabled = action.enabled, "action toggled");
        action.next_run = self.reschedule(&action).await;
        Ok(action)
    }

    /// Disarm and delete an action. A run already in flight finishes.
    ///
    /// # Errors
    ///
    /// Returns [`GpioHubError::NotFound`] when the action does not exist, or
    /// a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn delete_action(&self, id: ActionId) -> Result<(), GpioHubError> {
        let _guard = self.lock_action(id).await;
        self.get_action(id).await?;
        self.scheduler.remove_action(id);
        self.actions.delete(id).await?;
        self.write_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        tracing::info!(action_id = %id, "action deleted");
        Ok(())
    }

    /// Run an action now, outside its schedule.
    ///
    /// # Errors
    ///
    /// See [`ActionScheduler::execute_now`].
    pub async fn execute_action(&self, id: ActionId) -> Result<ExecutionLogEntry, GpioHubError> {
        self.scheduler.execute_now(id).await
    }

    /// Newest-first execution log of an action.
    ///
    /// # Errors
    ///
    /// Returns [`GpioHubError::NotFound`] when the action does not exist, or
    /// a storage error.
    pub async fn logs(&self, id: ActionId, limit: Option<u32>) -> Result<Vec<ExecutionLogEntry>, GpioHubError> {
        self.get_action(id).await?;
        self.actions
            .get_logs(id, limit.unwrap_or(DEFAULT_LOG_LIMIT))
            .await
    }

    #[must_use]
    pub fn scheduler_status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    /// Hold while changing the stored action and its job.
    async fn lock_action(&self, id: ActionId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(
            self.write_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(id)
                .or_default(),
        );
        lock.lock_owned().await
    }

    async fn reschedule(&self, action: &Action) -> Option<Timestamp> {
        if action.enabled {
            self.scheduler.schedule_action(action).await
        } else {
            self.scheduler.remove_action(action.id);
            if let Err(err) = self.actions.set_next_run(action.id, None).await {
                tracing::error!(action_id = %action.id, error = %err, "failed to clear next run");
            }
            None
        }
    }

    /// Shape, schedule grammar and device references.
    async fn check_definition(&self, action: &Action) -> Result<(), GpioHubError> {
        action.validate()?;
        schedule::resolve(action.kind, &action.schedule, self.clock.now())?;
        for step in &action.steps {
            if self.devices.get_by_id(step.device_id).await?.is_none() {
                return Err(ValidationError::UnknownDevice(step.device_id.get()).into());
            }
        }
        Ok(())
    }
}

fn not_found(id: ActionId) -> GpioHubError {
    NotFoundError {
        entity: "Action",
        id: id.to_string(),
    }
    .into()
}
