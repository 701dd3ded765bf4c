//! Action: a named, schedulable sequence of device steps.
//!
//! An action has a [`ActionKind`] that decides how its `schedule` string is
//! read (see [`crate::schedule`]), an ordered list of [`DeviceStep`]s, and
//! bookkeeping timestamps maintained by the scheduler.

mod log;
mod step;

pub use log::{ExecutionLogEntry, ExecutionStatus, SUCCESS_MESSAGE, StepFailure, summarize_run};
pub use step::{DeviceStep, StepType, in_execution_order};

use serde::{Deserialize, Serialize};

use crate::error::{GpioHubError, ValidationError};
use crate::id::ActionId;
use crate::time::Timestamp;

/// Free-form key/value parameters stored alongside an action.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// How an action's `schedule` string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Five-field cron expression.
    Timer,
    /// One-shot delay such as `90m`.
    Countdown,
    /// Fixed period such as `30s`.
    Interval,
}

impl ActionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::Countdown => "countdown",
            Self::Interval => "interval",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timer" => Ok(Self::Timer),
            "countdown" => Ok(Self::Countdown),
            "interval" => Ok(Self::Interval),
            other => Err(ValidationError::InvalidValue {
                field: "type",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub name: String,
    pub kind: ActionKind,
    pub schedule: String,
    #[serde(default)]
    pub parameters: Parameters,
    pub enabled: bool,
    #[serde(rename = "devices")]
    pub steps: Vec<DeviceStep>,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
    pub last_run: Option<Timestamp>,
    pub next_run: Option<Timestamp>,
}

impl Action {
    /// Create a builder for constructing an [`Action`].
    #[must_use]
    pub fn builder() -> ActionBuilder {
        ActionBuilder::default()
    }

    /// Steps in the order a run applies them.
    #[must_use]
    pub fn ordered_steps(&self) -> Vec<DeviceStep> {
        in_execution_order(&self.steps)
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`GpioHubError::Validation`] when:
    /// - `name` is blank ([`ValidationError::EmptyName`])
    /// - `schedule` is blank ([`ValidationError::MissingSchedule`])
    /// - there are no steps ([`ValidationError::NoSteps`])
    /// - a step has no device ([`ValidationError::IncompleteStep`])
    pub fn validate(&self) -> Result<(), GpioHubError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.schedule.trim().is_empty() {
            return Err(ValidationError::MissingSchedule.into());
        }
        if self.steps.is_empty() {
            return Err(ValidationError::NoSteps.into());
        }
        if let Some(index) = self.steps.iter().position(|s| !s.device_id.is_assigned()) {
            return Err(ValidationError::IncompleteStep {
                index,
                field: "device_id",
            }
            .into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Action`].
#[derive(Debug, Default)]
pub struct ActionBuilder {
    id: Option<ActionId>,
    name: Option<String>,
    kind: Option<ActionKind>,
    schedule: Option<String>,
    parameters: Parameters,
    enabled: Option<bool>,
    steps: Vec<DeviceStep>,
}

impl ActionBuilder {
    #[must_use]
    pub fn id(mut self, id: ActionId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: ActionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    #[must_use]
    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn step(mut self, step: DeviceStep) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn steps(mut self, steps: impl IntoIterator<Item = DeviceStep>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Consume the builder, validate, and return an [`Action`].
    ///
    /// The schedule string is trimmed but not interpreted here; that is
    /// [`crate::schedule::resolve`]'s job.
    ///
    /// # Errors
    ///
    /// Returns [`GpioHubError::Validation`] if required fields are missing or empty.
    pub fn build(self) -> Result<Action, GpioHubError> {
        let action = Action {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            kind: self.kind.unwrap_or(ActionKind::Timer),
            schedule: self.schedule.unwrap_or_default().trim().to_string(),
            parameters: self.parameters,
            enabled: self.enabled.unwrap_or(true),
            steps: self.steps,
            created_at: None,
            updated_at: None,
            last_run: None,
            next_run: None,
        };
        action.validate()?;
        Ok(action)
    }
}
