//! GPIO driver: device state → electrical level on the right line.

use gpiohub_domain::device::{Device, DeviceState};
use gpiohub_domain::error::{DeviceFault, GpioHubError};
use gpiohub_domain::pin::{self, LogicalLine, Polarity};

use crate::ports::OutputLines;

/// Applies device states through an [`OutputLines`] backend.
///
/// The physical pin is translated with [`pin::physical_to_logical`] and the
/// requested state with the configured [`Polarity`].
pub struct GpioDriver<L> {
    lines: L,
    polarity: Polarity,
}

impl<L: OutputLines> GpioDriver<L> {
    pub fn new(lines: L, polarity: Polarity) -> Self {
        Self { lines, polarity }
    }

    #[must_use]
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Drive `device`'s line so the device ends up in `state`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceFault::UnmappedPin`] when the pin has no GPIO line, or
    /// the backend's write error.
    #[tracing::instrument(skip(self, device), fields(device_id = %device.id, pin = device.pin))]
    pub async fn set(&self, device: &Device, state: DeviceState) -> Result<LogicalLine, GpioHubError> {
        let line = pin::physical_to_logical(device.pin).ok_or(DeviceFault::UnmappedPin(device.pin))?;
        let level = self.polarity.line_level(state);
        self.lines.write(line, level).await?;
        tracing::debug!(%line, %level, %state, "line driven");
        Ok(line)
    }

    /// Re-apply every device's persisted state. Failures are logged and skipped.
    ///
    /// Returns how many devices were applied.
    pub async fn initialize_all(&self, devices: &[Device]) -> usize {
        let mut applied = 0;
        for device in devices {
            match self.set(device, device.state).await {
                Ok(_) => applied += 1,
                Err(err) => {
                    tracing::warn!(device_id = %device.id, pin = device.pin, error = %err, "failed to initialise device line");
                }
            }
        }
        applied
    }
}
