//! GPIO pin catalog and the physical → logical line mapping.
//!
//! Devices reference pins by their **physical header position** (1–40 on a
//! Raspberry Pi 40-pin header). The kernel addresses output lines by their
//! **BCM number**. [`physical_to_logical`] is the one place that translates
//! between the two; nothing else in the workspace hard-codes BCM numbers.

use serde::{Deserialize, Serialize};

use crate::device::DeviceState;

/// Kernel-side GPIO line (BCM numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalLine(pub u8);

impl std::fmt::Display for LogicalLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BCM{}", self.0)
    }
}

/// Electrical level driven onto a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineLevel {
    High,
    Low,
}

impl std::fmt::Display for LineLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => f.write_str("high"),
            Self::Low => f.write_str("low"),
        }
    }
}

/// How a device's logical state maps onto the electrical line level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Driving the line high switches the device on.
    ActiveHigh,
    /// Driving the line low switches the device on (typical relay boards).
    ActiveLow,
}

/// Relay boards energise their coil when the input is pulled low, so a
/// `high` (device on) request drives the line electrically low.
pub const DEFAULT_POLARITY: Polarity = Polarity::ActiveLow;

impl Polarity {
    /// The line level that puts a device into `state`.
    #[must_use]
    pub fn line_level(self, state: DeviceState) -> LineLevel {
        match (self, state) {
            (Self::ActiveHigh, DeviceState::High) | (Self::ActiveLow, DeviceState::Low) => {
                LineLevel::High
            }
            (Self::ActiveHigh, DeviceState::Low) | (Self::ActiveLow, DeviceState::High) => {
                LineLevel::Low
            }
        }
    }

    #[must_use]
    pub fn from_active_low(active_low: bool) -> Self {
        if active_low {
            Self::ActiveLow
        } else {
            Self::ActiveHigh
        }
    }
}

/// What a header pin is electrically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinType {
    Gpio,
    Power,
    Ground,
    /// Wired to the HAT ID EEPROM; must not be driven.
    Reserved,
}

impl PinType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gpio => "gpio",
            Self::Power => "power",
            Self::Ground => "ground",
            Self::Reserved => "reserved",
        }
    }
}

impl std::str::FromStr for PinType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gpio" => Ok(Self::Gpio),
            "power" => Ok(Self::Power),
            "ground" => Ok(Self::Ground),
            "reserved" => Ok(Self::Reserved),
            other => Err(format!("unknown pin type {other:?}")),
        }
    }
}

/// One entry of the pin capability catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioPin {
    pub pin_number: u8,
    #[serde(rename = "type")]
    pub pin_type: PinType,
    pub category: String,
    pub capabilities: Vec<String>,
    pub description: String,
    pub is_used: bool,
}

impl GpioPin {
    /// Whether a new device may be attached to this pin.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.pin_type == PinType::Gpio && !self.is_used
    }

    /// The kernel line behind this pin, if it is a GPIO.
    #[must_use]
    pub fn logical_line(&self) -> Option<LogicalLine> {
        physical_to_logical(self.pin_number)
    }
}

/// Physical header pin → BCM line, for the Raspberry Pi 40-pin header.
///
/// Returns `None` for power, ground, out-of-range and ID EEPROM pins.
#[must_use]
pub fn physical_to_logical(pin: u8) -> Option<LogicalLine> {
    let bcm = match pin {
        3 => 2,
        5 => 3,
        7 => 4,
        8 => 14,
        10 => 15,
        11 => 17,
        12 => 18,
        13 => 27,
        15 => 22,
        16 => 23,
        18 => 24,
        19 => 10,
        21 => 9,
        22 => 25,
        23 => 11,
        24 => 8,
        26 => 7,
        29 => 5,
        31 => 6,
        32 => 12,
        33 => 13,
        35 => 19,
        36 => 16,
        37 => 26,
        38 => 20,
        40 => 21,
        _ => return None,
    };
    Some(LogicalLine(bcm))
}

/// The full 40-pin header catalog used to seed the pin table.
#[must_use]
pub fn header_catalog() -> Vec<GpioPin> {
    (1..=40).map(describe_header_pin).collect()
}

fn describe_header_pin(pin: u8) -> GpioPin {
    let (pin_type, category, capabilities, description): (PinType, &str, &[&str], String) =
        match pin {
            1 | 17 => (PinType::Power, "power", &[], "3.3V power".to_string()),
            2 | 4 => (PinType::Power, "power", &[], "5V power".to_string()),
            6 | 9 | 14 | 20 | 25 | 30 | 34 | 39 => {
                (PinType::Ground, "ground", &[], "Ground".to_string())
            }
            27 => (
                PinType::Reserved,
                "id_eeprom",
                &["i2c_sda"],
                "ID EEPROM data (BCM0)".to_string(),
            ),
            28 => (
                PinType::Reserved,
                "id_eeprom",
                &["i2c_scl"],
                "ID EEPROM clock (BCM1)".to_string(),
            ),
            _ => {
                let bcm = physical_to_logical(pin).map_or(0, |line| line.0);
                let (category, capabilities): (&str, &[&str]) = match bcm {
                    2 => ("i2c", &["digital_out", "digital_in", "i2c_sda"]),
                    3 => ("i2c", &["digital_out", "digital_in", "i2c_scl"]),
                    14 => ("uart", &["digital_out", "digital_in", "uart_tx"]),
                    15 => ("uart", &["digital_out", "digital_in", "uart_rx"]),
                    7..=11 => ("spi", &["digital_out", "digital_in", "spi"]),
                    12 | 13 | 18 | 19 => ("pwm", &["digital_out", "digital_in", "pwm"]),
                    _ => ("general", &["digital_out", "digital_in"]),
                };
                (PinType::Gpio, category, capabilities, format!("GPIO {bcm}"))
            }
        };

    GpioPin {
        pin_number: pin,
        pin_type,
        category: category.to_string(),
        capabilities: capabilities.iter().map(ToString::to_string).collect(),
        description,
        is_used: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_known_physical_pins_to_bcm() {
        assert_eq!(physical_to_logical(11), Some(LogicalLine(17)));
        assert_eq!(physical_to_logical(12), Some(LogicalLine(18)));
        assert_eq!(physical_to_logical(40), Some(LogicalLine(21)));
    }

    #[test]
    fn should_not_map_power_ground_or_out_of_range_pins() {
        assert_eq!(physical_to_logical(1), None);
        assert_eq!(physical_to_logical(6), None);
        assert_eq!(physical_to_logical(27), None);
        assert_eq!(physical_to_logical(41), None);
    }

    #[test]
    fn should_drive_line_low_for_on_when_active_low() {
        assert_eq!(
            Polarity::ActiveLow.line_level(DeviceState::High),
            LineLevel::Low
        );
        assert_eq!(
            Polarity::ActiveLow.line_level(DeviceState::Low),
            LineLevel::High
        );
    }

    #[test]
    fn should_drive_line_high_for_on_when_active_high() {
        assert_eq!(
            Polarity::ActiveHigh.line_level(DeviceState::High),
            LineLevel::High
        );
    }

    #[test]
    fn should_default_to_active_low_relays() {
        assert_eq!(DEFAULT_POLARITY, Polarity::ActiveLow);
    }

    #[test]
    fn should_catalog_all_forty_pins_with_26_usable_gpios() {
        let catalog = header_catalog();
        assert_eq!(catalog.len(), 40);
        let usable = catalog.iter().filter(|p| p.is_usable()).count();
        assert_eq!(usable, 26);
        assert!(catalog.iter().filter(|p| p.is_usable()).all(|p| p.logical_line().is_some()));
    }

    #[test]
    fn should_not_consider_used_pin_usable() {
        let mut pin = describe_header_pin(11);
        assert!(pin.is_usable());
        pin.is_used = true;
        assert!(!pin.is_usable());
    }
}
