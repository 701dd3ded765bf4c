//! Device controller: the single path that changes a device's on/off state.
//!
//! Both manual control (`POST /device`) and action steps go through here.
//! A write is: read the persisted device, resolve the target state, drive the
//! GPIO line, then persist. The whole sequence runs under one async lock, so a
//! `toggle` never interleaves with another write.

use gpiohub_domain::action::StepType;
use gpiohub_domain::device::{Device, DeviceState};
use gpiohub_domain::error::{GpioHubError, NotFoundError};
use gpiohub_domain::id::DeviceId;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::gpio_driver::GpioDriver;
use crate::ports::{DeviceRepository, OutputLines};

pub struct DeviceController<DR, L> {
    devices: DR,
    driver: GpioDriver<L>,
    clock: Clock,
    write_lock: Mutex<()>,
}

impl<DR: DeviceRepository, L: OutputLines> DeviceController<DR, L> {
    pub fn new(devices: DR, driver: GpioDriver<L>, clock: Clock) -> Self {
        Self {
            devices,
            driver,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// Switch a device to `state`.
    ///
    /// # Errors
    ///
    /// Returns [`GpioHubError::NotFound`] for an unknown device, a
    /// [`GpioHubError::Device`] fault from the line, or a storage error.
    pub async fn set_state(&self, id: DeviceId, state: DeviceState) -> Result<Device, GpioHubError> {
        let step = match state {
            DeviceState::High => StepType::High,
            DeviceState::Low => StepType::Low,
        };
        self.apply(id, step).await
    }

    /// Apply one step (`high`, `low` or `toggle`) to a device.
    ///
    /// # Errors
    ///
    /// Same as [`set_state`](Self::set_state). When the line write fails the
    /// persisted state is left unchanged.
    #[tracing::instrument(skip(self), fields(device_id = %id, step = %step))]
    pub async fn apply(&self, id: DeviceId, step: StepType) -> Result<Device, GpioHubError> {
        let _guard = self.write_lock.lock().await;
        let device = self.devices.get_by_id(id).await?.ok_or_else(|| NotFoundError {
            entity: "Device",
            id: id.to_string(),
        })?;
        let target = step.resolve(device.state);
        self.driver.set(&device, target).await?;
        let updated = self
            .devices
            .update_state(id, target, self.clock.now())
            .await?;
        tracing::info!(state = %updated.state, "device state changed");
        Ok(updated)
    }

    /// Push every persisted device state out to its line (startup).
    ///
    /// # Errors
    ///
    /// Returns a storage error if the devices cannot be loaded.
    pub async fn initialize_all(&self) -> Result<usize, GpioHubError> {
        let _guard = self.write_lock.lock().await;
        let devices = self.devices.get_all().await?;
        let applied = self.driver.initialize_all(&devices).await;
        tracing::info!(applied, total = devices.len(), "device lines initialised");
        Ok(applied)
    }
}
