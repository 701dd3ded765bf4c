//! Device service: registering and removing devices.

use gpiohub_domain::device::Device;
use gpiohub_domain::error::{GpioHubError, NotFoundError, ValidationError};
use gpiohub_domain::id::DeviceId;
use gpiohub_domain::pin::PinType;

use crate::ports::{DeviceRepository, PinRepository};

/// Application service for device registry operations.
pub struct DeviceService<DR, PR> {
    devices: DR,
    pins: PR,
}

impl<DR: DeviceRepository, PR: PinRepository> DeviceService<DR, PR> {
    /// Create a new service backed by the given repositories.
    pub fn new(devices: DR, pins: PR) -> Self {
        Self { devices, pins }
    }

    /// Register a device on a free GPIO pin.
    ///
    /// # Errors
    ///
    /// Returns [`GpioHubError::Validation`] if the device is invalid, the pin
    /// does not exist, is not a GPIO, or is already in use; or a storage error.
    #[tracing::instrument(skip(self, device), fields(device_name = %device.name, pin = device.pin))]
    pub async fn add_device(&self, device: Device) -> Result<Device, GpioHubError> {
        device.validate()?;
        let pin = self
            .pins
            .get(device.pin)
            .await?
            .ok_or(ValidationError::UnknownPin(device.pin))?;
        if pin.pin_type != PinType::Gpio {
            return Err(ValidationError::PinNotUsable(device.pin).into());
        }
        if pin.is_used {
            return Err(ValidationError::PinInUse(device.pin).into());
        }
        let created = self.devices.create(device).await?;
        tracing::info!(device_id = %created.id, "device registered");
        Ok(created)
    }

    /// Look up a device by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`GpioHubError::NotFound`] when no device with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_device(&self, id: DeviceId) -> Result<Device, GpioHubError> {
        self.devices.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Device",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all devices.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_devices(&self) -> Result<Vec<Device>, GpioHubError> {
        self.devices.get_all().await
    }

    /// Delete a device, freeing its pin.
    ///
    /// Action steps that still reference the device keep it; those steps
    /// fail at run time instead.
    ///
    /// # Errors
    ///
    /// Returns [`GpioHubError::NotFound`] if the device does not exist, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn remove_device(&self, id: DeviceId) -> Result<(), GpioHubError> {
        self.devices.delete(id).await?;
        tracing::info!(device_id = %id, "device removed");
        Ok(())
    }
}
