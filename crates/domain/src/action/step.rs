//! DeviceStep: one device transition inside an action run.

use serde::{Deserialize, Serialize};

use crate::device::DeviceState;
use crate::error::ValidationError;
use crate::id::DeviceId;

/// What a step does to its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    High,
    Low,
    /// Flip whatever state is persisted at the moment the step runs.
    Toggle,
}

impl StepType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
            Self::Toggle => "toggle",
        }
    }

    /// The state this step leaves the device in, given its current state.
    #[must_use]
    pub fn resolve(self, current: DeviceState) -> DeviceState {
        match self {
            Self::High => DeviceState::High,
            Self::Low => DeviceState::Low,
            Self::Toggle => current.toggled(),
        }
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            "toggle" => Ok(Self::Toggle),
            other => Err(ValidationError::InvalidValue {
                field: "action_type",
                value: other.to_string(),
            }),
        }
    }
}

/// A single device transition, applied `delay_seconds` after the run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStep {
    pub device_id: DeviceId,
    pub action_type: StepType,
    #[serde(default)]
    pub delay_seconds: u32,
}

impl DeviceStep {
    #[must_use]
    pub fn new(device_id: DeviceId, action_type: StepType, delay_seconds: u32) -> Self {
        Self {
            device_id,
            action_type,
            delay_seconds,
        }
    }
}

/// Stable sort by `delay_seconds`: equal delays keep their insertion order.
#[must_use]
pub fn in_execution_order(steps: &[DeviceStep]) -> Vec<DeviceStep> {
    let mut ordered = steps.to_vec();
    ordered.sort_by_key(|step| step.delay_seconds);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_resolve_toggle_against_current_state() {
        assert_eq!(StepType::Toggle.resolve(DeviceState::Low), DeviceState::High);
        assert_eq!(StepType::Toggle.resolve(DeviceState::High), DeviceState::Low);
        assert_eq!(StepType::High.resolve(DeviceState::High), DeviceState::High);
        assert_eq!(StepType::Low.resolve(DeviceState::High), DeviceState::Low);
    }

    #[test]
    fn should_order_by_delay_keeping_ties_in_insertion_order() {
        let steps = vec![
            DeviceStep::new(DeviceId::new(1), StepType::High, 5),
            DeviceStep::new(DeviceId::new(2), StepType::Low, 2),
            DeviceStep::new(DeviceId::new(3), StepType::Toggle, 2),
            DeviceStep::new(DeviceId::new(4), StepType::High, 0),
        ];
        let ids: Vec<i64> = in_execution_order(&steps)
            .iter()
            .map(|s| s.device_id.get())
            .collect();
        assert_eq!(ids, vec![4, 2, 3, 1]);
    }

    #[test]
    fn should_reject_unknown_step_type() {
        assert!("blink".parse::<StepType>().is_err());
        assert_eq!("toggle".parse::<StepType>().unwrap(), StepType::Toggle);
    }

    #[test]
    fn should_default_delay_to_zero_when_deserializing() {
        let step: DeviceStep =
            serde_json::from_value(serde_json::json!({"device_id": 3, "action_type": "low"}))
                .unwrap();
        assert_eq!(step.delay_seconds, 0);
        assert_eq!(step.device_id, DeviceId::new(3));
    }
}
