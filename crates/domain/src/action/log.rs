//! Execution log: one entry per action run.

use serde::{Deserialize, Serialize};

use crate::id::ActionId;
use crate::time::Timestamp;

/// Message recorded when every step applied cleanly.
pub const SUCCESS_MESSAGE: &str = "Action executed successfully";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error,
}

impl ExecutionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown execution status {other:?}")),
        }
    }
}

/// Append-only record of a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// Store-assigned; `0` until appended.
    #[serde(default)]
    pub id: i64,
    pub action_id: ActionId,
    pub status: ExecutionStatus,
    pub message: String,
    pub executed_at: Timestamp,
}

impl ExecutionLogEntry {
    #[must_use]
    pub fn success(action_id: ActionId, executed_at: Timestamp) -> Self {
        Self {
            id: 0,
            action_id,
            status: ExecutionStatus::Success,
            message: SUCCESS_MESSAGE.to_string(),
            executed_at,
        }
    }

    #[must_use]
    pub fn error(action_id: ActionId, message: impl Into<String>, executed_at: Timestamp) -> Self {
        Self {
            id: 0,
            action_id,
            status: ExecutionStatus::Error,
            message: message.into(),
            executed_at,
        }
    }
}

/// A failed step, kept until the run writes its single log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub device_id: crate::id::DeviceId,
    pub reason: String,
}

/// Summarise a run: `success` when nothing failed, otherwise
/// `"<k> of <n> steps failed: device <id>: <reason>; ..."`.
#[must_use]
pub fn summarize_run(
    action_id: ActionId,
    total_steps: usize,
    failures: &[StepFailure],
    executed_at: Timestamp,
) -> ExecutionLogEntry {
    if failures.is_empty() {
        return ExecutionLogEntry::success(action_id, executed_at);
    }
    let details = failures
        .iter()
        .map(|f| format!("device {}: {}", f.device_id, f.reason))
        .collect::<Vec<_>>()
        .join("; ");
    ExecutionLogEntry::error(
        action_id,
        format!(
            "{} of {total_steps} steps failed: {details}",
            failures.len()
        ),
        executed_at,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::DeviceId;

    #[test]
    fn should_summarize_clean_run_as_success() {
        let now = crate::time::now();
        let entry = summarize_run(ActionId::new(1), 2, &[], now);
        assert_eq!(entry.status, ExecutionStatus::Success);
        assert_eq!(entry.message, SUCCESS_MESSAGE);
        assert_eq!(entry.executed_at, now);
    }

    #[test]
    fn should_list_every_failed_device_in_error_message() {
        let failures = vec![
            StepFailure {
                device_id: DeviceId::new(2),
                reason: "Device 2 not found".to_string(),
            },
            StepFailure {
                device_id: DeviceId::new(5),
                reason: "write failed".to_string(),
            },
        ];
        let entry = summarize_run(ActionId::new(1), 3, &failures, crate::time::now());
        assert_eq!(entry.status, ExecutionStatus::Error);
        assert_eq!(
            entry.message,
            "2 of 3 steps failed: device 2: Device 2 not found; device 5: write failed"
        );
    }
}
