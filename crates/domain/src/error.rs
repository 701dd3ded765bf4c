//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`GpioHubError`]
//! via `#[from]`. Adapter-specific failures (database, filesystem) are boxed
//! into [`GpioHubError::Storage`] so the domain never depends on them.

use crate::pin::LogicalLine;

/// Top-level error shared by every crate in the workspace.
#[derive(Debug, thiserror::Error)]
pub enum GpioHubError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Device(#[from] DeviceFault),

    #[error("storage error: {0}")]
    Storage(Box<dyn std::error::Error + Send + Sync>),
}

/// A request or domain object violates an invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("schedule is required")]
    MissingSchedule,

    #[error("at least one device step is required")]
    NoSteps,

    #[error("device step {index} is missing `{field}`")]
    IncompleteStep { index: usize, field: &'static str },

    #[error("device {0} does not exist")]
    UnknownDevice(i64),

    #[error("pin_number is required")]
    MissingPin,

    #[error("pin {0} does not exist")]
    UnknownPin(u8),

    #[error("pin {0} cannot drive an output")]
    PinNotUsable(u8),

    #[error("pin {0} is already in use")]
    PinInUse(u8),

    #[error("invalid {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// A schedule string could not be interpreted for its action kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid schedule format {schedule:?}: {reason}")]
    InvalidScheduleFormat { schedule: String, reason: String },
}

impl ScheduleError {
    pub(crate) fn invalid(schedule: &str, reason: impl Into<String>) -> Self {
        Self::InvalidScheduleFormat {
            schedule: schedule.to_string(),
            reason: reason.into(),
        }
    }
}

/// The request is well-formed but clashes with the current state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("action {0} is disabled")]
    ActionDisabled(i64),

    #[error("action {0} is already running")]
    ActionBusy(i64),
}

/// Driving a device failed at the hardware boundary.
#[derive(Debug, thiserror::Error)]
pub enum DeviceFault {
    #[error("pin {0} has no GPIO line")]
    UnmappedPin(u8),

    #[error("write to GPIO line {line} failed: {source}")]
    Write {
        line: LogicalLine,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
