//! Action scheduler: the live job table.
//!
//! Every enabled action with a valid schedule owns one [`Job`], keyed by its
//! [`ActionId`]. A job is a tokio task that sleeps until the trigger's next
//! due time, hands the firing to the [`Executor`], and computes the following
//! due time from the [`Trigger`].
//!
//! Guarantees:
//! - Replacing or removing a job bumps its generation under the table lock,
//!   so a stale task can never dispatch.
//! - At most one run per action is in flight. A firing that arrives while the
//!   previous run is still going is dropped.
//! - A firing later than the misfire grace window is skipped.

mod executor;

pub use executor::{Executor, RunOutcome, SkipReason};

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{FixedOffset, Offset, Utc};
use gpiohub_domain::action::{Action, ExecutionLogEntry};
use gpiohub_domain::error::{ConflictError, GpioHubError, NotFoundError};
use gpiohub_domain::id::ActionId;
use gpiohub_domain::schedule::{self, Trigger};
use gpiohub_domain::time::Timestamp;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::ports::{ActionRepository, DeviceRepository, OutputLines};

/// Timing knobs for the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// How late a firing may start before it is skipped.
    pub misfire_grace: chrono::Duration,
    /// Offset cron expressions are evaluated in.
    pub utc_offset: FixedOffset,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            misfire_grace: chrono::Duration::seconds(30),
            utc_offset: Utc.fix(),
        }
    }
}

/// Snapshot of one armed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub action_id: ActionId,
    pub name: String,
    /// `None` once a one-shot trigger has fired or a cron can never match.
    pub next_run: Option<Timestamp>,
    pub trigger: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub running: bool,
    pub jobs: Vec<JobInfo>,
}

struct Job {
    name: String,
    description: String,
    next_run: Option<Timestamp>,
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct JobTable {
    running: bool,
    generation: u64,
    jobs: HashMap<ActionId, Job>,
    in_flight: HashSet<ActionId>,
}

fn lock(table: &Mutex<JobTable>) -> MutexGuard<'_, JobTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases an action's in-flight slot when its run ends, even if the run
/// task is aborted.
struct InFlightGuard {
    table: Arc<Mutex<JobTable>>,
    action_id: ActionId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.table).in_flight.remove(&self.action_id);
    }
}

struct Inner<AR, DR, L> {
    executor: Executor<AR, DR, L>,
    clock: Clock,
    settings: SchedulerSettings,
    table: Arc<Mutex<JobTable>>,
}

/// Owns the job table. Cheap to clone; clones share the same table.
pub struct ActionScheduler<AR, DR, L> {
    inner: Arc<Inner<AR, DR, L>>,
}

impl<AR, DR, L> Clone for ActionScheduler<AR, DR, L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<AR, DR, L> ActionScheduler<AR, DR, L>
where
    AR: ActionRepository + Send + Sync + 'static,
    DR: DeviceRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    pub fn new(executor: Executor<AR, DR, L>, clock: Clock, settings: SchedulerSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor,
                clock,
                settings,
                table: Arc::new(Mutex::new(JobTable::default())),
            }),
        }
    }

    /// Start scheduling and arm a job for every enabled action.
    ///
    /// Calling it again while running does nothing. Returns how many jobs are
    /// armed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the enabled actions cannot be loaded; the
    /// scheduler is left stopped.
    pub async fn start(&self) -> Result<usize, GpioHubError> {
        {
            let mut table = lock(&self.inner.table);
            if table.running {
                tracing::debug!("scheduler already running");
                return Ok(table.jobs.len());
            }
            table.running = true;
        }

        let actions = match self.inner.executor.actions.get_enabled().await {
            Ok(actions) => actions,
            Err(err) => {
                lock(&self.inner.table).running = false;
                return Err(err);
            }
        };
        for action in &actions {
            self.schedule_action(action).await;
        }

        let armed = lock(&self.inner.table).jobs.len();
        tracing::info!(armed, enabled = actions.len(), "scheduler started");
        Ok(armed)
    }

    /// Abort every job. Runs already in flight finish on their own.
    pub fn stop(&self) {
        let mut table = lock(&self.inner.table);
        table.running = false;
        let count = table.jobs.len();
        for (_, job) in table.jobs.drain() {
            job.handle.abort();
        }
        tracing::info!(jobs = count, "scheduler stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.inner.table).running
    }

    /// Arm (or re-arm) the job for `action` and persist its next due time.
    ///
    /// A disabled action or an unparsable schedule leaves the action with no
    /// job. The error is logged, not returned. Returns the next due time.
    #[tracing::instrument(skip(self, action), fields(action_id = %action.id))]
    pub async fn schedule_action(&self, action: &Action) -> Option<Timestamp> {
        let next_run = if action.enabled {
            let now = self.inner.clock.now();
            match schedule::resolve(action.kind, &action.schedule, now) {
                Ok(trigger) => self.arm(action, trigger, now),
                Err(err) => {
                    tracing::error!(error = %err, "invalid schedule, action left unscheduled");
                    self.remove_action(action.id);
                    None
                }
            }
        } else {
            self.remove_action(action.id);
            None
        };
        self.inner.persist_next_run(action.id, next_run).await;
        next_run
    }

    fn arm(&self, action: &Action, trigger: Trigger, now: Timestamp) -> Option<Timestamp> {
        let next_run = trigger.first_fire(now, self.inner.settings.utc_offset);
        let description = trigger.to_string();

        let mut table = lock(&self.inner.table);
        if !table.running {
            tracing::debug!("scheduler not running, job not armed");
            return None;
        }
        table.generation += 1;
        let generation = table.generation;
        let replaced = match table.jobs.remove(&action.id) {
            Some(old) => {
                old.handle.abort();
                true
            }
            None => false,
        };
        let handle = tokio::spawn(Inner::job_loop(
            Arc::clone(&self.inner),
            action.id,
            generation,
            trigger,
            next_run,
        ));
        tracing::info!(trigger = %description, next_run = ?next_run, replaced, "job armed");
        table.jobs.insert(
            action.id,
            Job {
                name: action.name.clone(),
                description,
                next_run,
                generation,
                handle,
            },
        );
        next_run
    }

    /// Disarm the job for `action_id`. Returns whether one existed.
    pub fn remove_action(&self, action_id: ActionId) -> bool {
        let removed = lock(&self.inner.table).jobs.remove(&action_id);
        match removed {
            Some(job) => {
                job.handle.abort();
                tracing::info!(%action_id, "job removed");
                true
            }
            None => false,
        }
    }

    /// Run an action right away and wait for the run to finish.
    ///
    /// Armed jobs are not touched.
    ///
    /// # Errors
    ///
    /// - [`GpioHubError::NotFound`] if the action does not exist
    /// - [`ConflictError::ActionDisabled`] if it is disabled
    /// - [`ConflictError::ActionBusy`] if a run is already in flight
    /// - a storage error from loading the action
    #[tracing::instrument(skip(self), fields(action_id = %action_id))]
    pub async fn execute_now(&self, action_id: ActionId) -> Result<ExecutionLogEntry, GpioHubError> {
        let action = self
            .inner
            .executor
            .actions
            .get_by_id(action_id)
            .await?
            .ok_or_else(|| action_not_found(action_id))?;
        if !action.enabled {
            return Err(ConflictError::ActionDisabled(action_id.get()).into());
        }

        let _guard = self.inner.claim(action_id).ok_or(ConflictError::ActionBusy(action_id.get()))?;
        match self.inner.executor.run(action_id).await {
            RunOutcome::Completed(entry) => Ok(entry),
            RunOutcome::Skipped(SkipReason::Missing) => Err(action_not_found(action_id)),
            RunOutcome::Skipped(SkipReason::Disabled) => {
                Err(ConflictError::ActionDisabled(action_id.get()).into())
            }
        }
    }

    /// Armed jobs, ordered by action id.
    #[must_use]
    pub fn list_jobs(&self) -> Vec<JobInfo> {
        let table = lock(&self.inner.table);
        let mut jobs: Vec<JobInfo> = table
            .jobs
            .iter()
            .map(|(action_id, job)| JobInfo {
                action_id: *action_id,
                name: job.name.clone(),
                next_run: job.next_run,
                trigger: job.description.clone(),
            })
            .collect();
        jobs.sort_by_key(|job| job.action_id);
        jobs
    }

    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.is_running(),
            jobs: self.list_jobs(),
        }
    }
}

impl<AR, DR, L> Inner<AR, DR, L>
where
    AR: ActionRepository + Send + Sync + 'static,
    DR: DeviceRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    async fn job_loop(
        self: Arc<Self>,
        action_id: ActionId,
        generation: u64,
        trigger: Trigger,
        mut due: Option<Timestamp>,
    ) {
        while let Some(at) = due {
            self.clock.sleep_until(at).await;
            let now = self.clock.now();
            if schedule::within_grace(at, now, self.settings.misfire_grace) {
                tracing::debug!(%action_id, due = %at, "job fired");
                self.dispatch(action_id, generation);
            } else {
                tracing::warn!(%action_id, due = %at, late_by = %(now - at), "missed firing beyond grace window, skipped");
            }

            due = trigger.following(at, now, self.settings.utc_offset);
            if !self.record_next_run(action_id, generation, due) {
                return;
            }
            self.persist_next_run(action_id, due).await;
        }
    }

    /// Start a run in the background unless the job is stale or one is in flight.
    fn dispatch(self: &Arc<Self>, action_id: ActionId, generation: u64) {
        {
            let table = lock(&self.table);
            let current = table
                .jobs
                .get(&action_id)
                .is_some_and(|job| job.generation == generation);
            if !table.running || !current {
                return;
            }
        }
        let Some(guard) = self.claim(action_id) else {
            tracing::debug!(%action_id, "previous run still in flight, firing skipped");
            return;
        };
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            inner.executor.run(action_id).await;
        });
    }

    fn claim(&self, action_id: ActionId) -> Option<InFlightGuard> {
        lock(&self.table)
            .in_flight
            .insert(action_id)
            .then(|| InFlightGuard {
                table: Arc::clone(&self.table),
                action_id,
            })
    }

    /// Update the table's copy of `next_run`. Returns `false` if the job is stale.
    fn record_next_run(&self, action_id: ActionId, generation: u64, next_run: Option<Timestamp>) -> bool {
        let mut table = lock(&self.table);
        match table.jobs.get_mut(&action_id) {
            Some(job) if job.generation == generation => {
                job.next_run = next_run;
                true
            }
            _ => false,
        }
    }

    async fn persist_next_run(&self, action_id: ActionId, next_run: Option<Timestamp>) {
        if let Err(err) = self.executor.actions.set_next_run(action_id, next_run).await {
            tracing::error!(%action_id, error = %err, "failed to persist next run");
        }
    }
}

fn action_not_found(action_id: ActionId) -> GpioHubError {
    NotFoundError {
        entity: "Action",
        id: action_id.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio_driver::GpioDriver;
    use crate::services::device_controller::DeviceController;
    use crate::testing::{InMemoryStore, RecordingLines};
    use chrono::TimeZone;
    use gpiohub_domain::action::{ActionKind, DeviceStep, StepType};
    use gpiohub_domain::pin::Polarity;
    use std::time::Duration;

    type TestScheduler = ActionScheduler<InMemoryStore, InMemoryStore, RecordingLines>;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn make_scheduler() -> (TestScheduler, InMemoryStore, RecordingLines) {
        let store = InMemoryStore::default();
        let lines = RecordingLines::default();
        let clock = Clock::anchored(t0());
        let controller = Arc::new(DeviceController::new(
            store.clone(),
            GpioDriver::new(lines.clone(), Polarity::ActiveHigh),
            clock,
        ));
        let executor = Executor::new(store.clone(), controller, clock);
        (
            ActionScheduler::new(executor, clock, SchedulerSettings::default()),
            store,
            lines,
        )
    }

    async fn insert_action(
        store: &InMemoryStore,
        kind: ActionKind,
        schedule: &str,
        step: DeviceStep,
        enabled: bool,
    ) -> Action {
        let action = Action::builder()
            .name("job")
            .kind(kind)
            .schedule(schedule)
            .enabled(enabled)
            .step(step)
            .build()
            .unwrap();
        ActionRepository::create(store, action).await.unwrap()
    }

    async fn toggle_action(store: &InMemoryStore, kind: ActionKind, schedule: &str) -> Action {
        let device = store.seed_device("lamp", 11);
        insert_action(
            store,
            kind,
            schedule,
            DeviceStep::new(device.id, StepType::Toggle, 0),
            true,
        )
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn should_fire_interval_exactly_one_period_apart() {
        let (scheduler, store, lines) = make_scheduler();
        let action = toggle_action(&store, ActionKind::Interval, "30s").await;

        assert_eq!(scheduler.start().await.unwrap(), 1);
        tokio::time::sleep(Duration::from_secs(95)).await;

        assert_eq!(store.logs().len(), 3);
        assert_eq!(lines.writes().len(), 3);
        let next_runs: Vec<Timestamp> = store.next_runs(action.id).into_iter().flatten().collect();
        assert_eq!(
            next_runs,
            vec![
                t0() + chrono::Duration::seconds(30),
                t0() + chrono::Duration::seconds(60),
                t0() + chrono::Duration::seconds(90),
                t0() + chrono::Duration::seconds(120),
            ]
        );
        assert_eq!(
            store.action(action.id).unwrap().next_run,
            Some(t0() + chrono::Duration::seconds(120))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_run_action_disabled_after_arming() {
        let (scheduler, store, lines) = make_scheduler();
        let action = toggle_action(&store, ActionKind::Interval, "10s").await;
        scheduler.start().await.unwrap();

        ActionRepository::set_enabled(&store, action.id, false)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(25)).await;

        assert!(store.logs().is_empty());
        assert!(lines.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_replace_job_without_double_firing() {
        let (scheduler, store, _) = make_scheduler();
        let action = toggle_action(&store, ActionKind::Interval, "30s").await;
        scheduler.start().await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        let next = scheduler.schedule_action(&action).await;
        assert_eq!(next, Some(t0() + chrono::Duration::seconds(40)));

        tokio::time::sleep(Duration::from_secs(35)).await;

        assert_eq!(store.logs().len(), 1);
        let jobs = scheduler.list_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].next_run, Some(t0() + chrono::Duration::seconds(70)));
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_firing_while_previous_run_in_flight() {
        let (scheduler, store, lines) = make_scheduler();
        let device = store.seed_device("lamp", 11);
        insert_action(
            &store,
            ActionKind::Interval,
            "2s",
            DeviceStep::new(device.id, StepType::Toggle, 3),
            true,
        )
        .await;
        scheduler.start().await.unwrap();

        // runs start at 2s (writes at 5s); the 4s firing overlaps and is
        // dropped; the next run starts at 6s and writes at 9s
        tokio::time::sleep(Duration::from_millis(7_500)).await;

        assert_eq!(lines.writes().len(), 1);
        assert_eq!(store.logs().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_fire_countdown_once_and_keep_exhausted_job_listed() {
        let (scheduler, store, _) = make_scheduler();
        let action = toggle_action(&store, ActionKind::Countdown, "1m").await;
        scheduler.start().await.unwrap();
        assert_eq!(
            scheduler.list_jobs()[0].next_run,
            Some(t0() + chrono::Duration::minutes(1))
        );

        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(store.logs().len(), 1);
        let jobs = scheduler.list_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].action_id, action.id);
        assert_eq!(jobs[0].next_run, None);
        assert!(store.action(action.id).unwrap().enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn should_leave_invalid_schedule_unscheduled_but_enabled() {
        let (scheduler, store, _) = make_scheduler();
        let broken = toggle_action(&store, ActionKind::Timer, "every day").await;
        let device = store.seed_device("fan", 12);
        insert_action(
            &store,
            ActionKind::Interval,
            "5m",
            DeviceStep::new(device.id, StepType::High, 0),
            true,
        )
        .await;

        let armed = scheduler.start().await.unwrap();

        assert_eq!(armed, 1);
        assert!(scheduler.list_jobs().iter().all(|job| job.action_id != broken.id));
        assert!(store.action(broken.id).unwrap().enabled);
        assert_eq!(store.action(broken.id).unwrap().next_run, None);
    }

    #[tokio::test(start_paused = true)]
    async fn should_describe_jobs_in_status() {
        let (scheduler, store, _) = make_scheduler();
        toggle_action(&store, ActionKind::Timer, "30 7 * * 1-5").await;
        scheduler.start().await.unwrap();

        let status = scheduler.status();
        assert!(status.running);
        assert_eq!(status.jobs[0].trigger, "cron[30 7 * * 1-5]");
        // 2024-01-01 is a Monday
        assert_eq!(
            status.jobs[0].next_run,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 7, 30, 0).unwrap())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_be_idempotent_on_start_and_stop_future_firings() {
        let (scheduler, store, _) = make_scheduler();
        toggle_action(&store, ActionKind::Interval, "10s").await;

        scheduler.start().await.unwrap();
        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(store.logs().len(), 1);

        scheduler.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(store.logs().len(), 1);
        let status = scheduler.status();
        assert!(!status.running);
        assert!(status.jobs.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_remove_job_and_ignore_missing_one() {
        let (scheduler, store, _) = make_scheduler();
        let action = toggle_action(&store, ActionKind::Interval, "10s").await;
        scheduler.start().await.unwrap();

        assert!(scheduler.remove_action(action.id));
        assert!(!scheduler.remove_action(action.id));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(store.logs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_reject_execute_now_on_disabled_action() {
        let (scheduler, store, lines) = make_scheduler();
        let device = store.seed_device("lamp", 11);
        let action = insert_action(
            &store,
            ActionKind::Interval,
            "10s",
            DeviceStep::new(device.id, StepType::High, 0),
            false,
        )
        .await;

        let result = scheduler.execute_now(action.id).await;

        assert!(matches!(
            result,
            Err(GpioHubError::Conflict(ConflictError::ActionDisabled(_)))
        ));
        assert!(!store.action(action.id).unwrap().enabled);
        assert!(store.logs().is_empty());
        assert!(lines.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_reject_execute_now_while_run_in_flight() {
        let (scheduler, store, _) = make_scheduler();
        let device = store.seed_device("lamp", 11);
        let action = insert_action(
            &store,
            ActionKind::Countdown,
            "1h",
            DeviceStep::new(device.id, StepType::High, 5),
            true,
        )
        .await;

        let background = scheduler.clone();
        let first = tokio::spawn(async move { background.execute_now(action.id).await });
        tokio::time::sleep(Duration::from_secs(1)).await;

        let second = scheduler.execute_now(action.id).await;
        assert!(matches!(
            second,
            Err(GpioHubError::Conflict(ConflictError::ActionBusy(_)))
        ));

        let entry = first.await.unwrap().unwrap();
        assert_eq!(entry.action_id, action.id);
        assert_eq!(store.logs().len(), 1);

        // the slot is released once the run ends
        assert!(scheduler.execute_now(action.id).await.is_ok());
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_action() {
        let (scheduler, _, _) = make_scheduler();
        assert!(matches!(
            scheduler.execute_now(ActionId::new(9)).await,
            Err(GpioHubError::NotFound(_))
        ));
    }
}
