//! Executor: one firing of one action, start to finish.
//!
//! Steps run strictly one after another in ascending `delay_seconds` order.
//! Each delay is measured from the start of the run. A failing step is
//! recorded and the run moves on; the run always ends with exactly one log
//! entry and a `last_run` stamp.

use std::sync::Arc;
use std::time::Duration;

use gpiohub_domain::action::{ExecutionLogEntry, StepFailure, summarize_run};
use gpiohub_domain::id::ActionId;
use tokio::time::Instant;

use crate::clock::Clock;
use crate::ports::{ActionRepository, DeviceRepository, OutputLines};
use crate::services::device_controller::DeviceController;

/// Why a run did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The action was deleted after its job was armed.
    Missing,
    /// The action was disabled after its job was armed.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(ExecutionLogEntry),
    Skipped(SkipReason),
}

pub struct Executor<AR, DR, L> {
    pub(super) actions: AR,
    controller: Arc<DeviceController<DR, L>>,
    clock: Clock,
}

impl<AR, DR, L> Executor<AR, DR, L>
where
    AR: ActionRepository,
    DR: DeviceRepository,
    L: OutputLines,
{
    pub fn new(actions: AR, controller: Arc<DeviceController<DR, L>>, clock: Clock) -> Self {
        Self {
            actions,
            controller,
            clock,
        }
    }

    #[tracing::instrument(skip(self), fields(action_id = %id))]
    pub async fn run(&self, id: ActionId) -> RunOutcome {
        let action = match self.actions.get_by_id(id).await {
            Ok(Some(action)) => action,
            Ok(None) => {
                tracing::debug!("action no longer exists, nothing to run");
                return RunOutcome::Skipped(SkipReason::Missing);
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to load action");
                let entry = ExecutionLogEntry::error(
                    id,
                    format!("failed to load action: {err}"),
                    self.clock.now(),
                );
                return RunOutcome::Completed(self.finish(entry).await);
            }
        };
        if !action.enabled {
            tracing::debug!("action is disabled, nothing to run");
            return RunOutcome::Skipped(SkipReason::Disabled);
        }

        let steps = action.ordered_steps();
        let started = Instant::now();
        let mut failures = Vec::new();
        for step in &steps {
            tokio::time::sleep_until(started + Duration::from_secs(u64::from(step.delay_seconds)))
                .await;
            if let Err(err) = self.controller.apply(step.device_id, step.action_type).await {
                tracing::warn!(device_id = %step.device_id, error = %err, "step failed");
                failures.push(StepFailure {
                    device_id: step.device_id,
                    reason: err.to_string(),
                });
            }
        }

        let entry = summarize_run(id, steps.len(), &failures, self.clock.now());
        tracing::info!(status = entry.status.as_str(), steps = steps.len(), failed = failures.len(), "action run finished");
        RunOutcome::Completed(self.finish(entry).await)
    }

    /// Append the log entry and stamp `last_run`. Store failures are logged only.
    async fn finish(&self, entry: ExecutionLogEntry) -> ExecutionLogEntry {
        let executed_at = entry.executed_at;
        let action_id = entry.action_id;
        let entry = match self.actions.append_log(entry.clone()).await {
            Ok(saved) => saved,
            Err(err) => {
                tracing::error!(error = %err, "failed to append execution log");
                entry
            }
        };
        if let Err(err) = self.actions.record_run(action_id, executed_at).await {
            tracing::error!(error = %err, "failed to record last run");
        }
        entry
    }
}
