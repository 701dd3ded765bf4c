//! Device: a relay, bulb or fan wired to exactly one physical GPIO pin.

use serde::{Deserialize, Serialize};

use crate::error::{GpioHubError, ValidationError};
use crate::id::DeviceId;
use crate::time::Timestamp;

/// Icon used when a device is registered without one.
pub const DEFAULT_ICON: &str = "fa-lightbulb";

/// Persisted on/off state of a device.
///
/// `High` means the device is **on**, regardless of how the relay is wired
/// (see [`Polarity`](crate::pin::Polarity)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    High,
    #[default]
    Low,
}

impl DeviceState {
    /// The opposite state.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::High => Self::Low,
            Self::Low => Self::High,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            other => Err(ValidationError::InvalidValue {
                field: "action",
                value: other.to_string(),
            }),
        }
    }
}

/// A controllable device bound to a physical header pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub icon: String,
    /// Physical header pin number (see [`crate::pin`]).
    #[serde(rename = "pin_number")]
    pub pin: u8,
    pub state: DeviceState,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`GpioHubError::Validation`] when:
    /// - `name` is blank ([`ValidationError::EmptyName`])
    /// - `pin` is zero ([`ValidationError::MissingPin`])
    pub fn validate(&self) -> Result<(), GpioHubError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.pin == 0 {
            return Err(ValidationError::MissingPin.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    name: Option<String>,
    icon: Option<String>,
    pin: Option<u8>,
    state: Option<DeviceState>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: DeviceId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn pin(mut self, pin: u8) -> Self {
        self.pin = Some(pin);
        self
    }

    #[must_use]
    pub fn state(mut self, state: DeviceState) -> Self {
        self.state = Some(state);
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// # Errors
    ///
    /// Returns [`GpioHubError::Validation`] if required fields are missing or empty.
    pub fn build(self) -> Result<Device, GpioHubError> {
        let device = Device {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            icon: self
                .icon
                .filter(|icon| !icon.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ICON.to_string()),
            pin: self.pin.unwrap_or_default(),
            state: self.state.unwrap_or_default(),
            created_at: None,
            updated_at: None,
        };
        device.validate()?;
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_device_with_defaults() {
        let device = Device::builder().name("Lamp").pin(11).build().unwrap();
        assert_eq!(device.name, "Lamp");
        assert_eq!(device.icon, DEFAULT_ICON);
        assert_eq!(device.state, DeviceState::Low);
        assert!(!device.id.is_assigned());
    }

    #[test]
    fn should_reject_blank_name() {
        let result = Device::builder().name("  ").pin(11).build();
        assert!(matches!(
            result,
            Err(GpioHubError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_reject_missing_pin() {
        let result = Device::builder().name("Fan").build();
        assert!(matches!(
            result,
            Err(GpioHubError::Validation(ValidationError::MissingPin))
        ));
    }

    #[test]
    fn should_toggle_between_high_and_low() {
        assert_eq!(DeviceState::High.toggled(), DeviceState::Low);
        assert_eq!(DeviceState::Low.toggled(), DeviceState::High);
    }

    #[test]
    fn should_parse_only_high_and_low() {
        assert_eq!("high".parse::<DeviceState>().unwrap(), DeviceState::High);
        assert_eq!("low".parse::<DeviceState>().unwrap(), DeviceState::Low);
        assert!("on".parse::<DeviceState>().is_err());
    }

    #[test]
    fn should_serialize_pin_as_pin_number() {
        let device = Device::builder().name("Fan").pin(13).build().unwrap();
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["pin_number"], 13);
        assert_eq!(json["state"], "low");
    }
}
