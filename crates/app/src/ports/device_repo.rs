//! Device repository port: persistence for devices.

use std::future::Future;

use gpiohub_domain::device::{Device, DeviceState};
use gpiohub_domain::error::GpioHubError;
use gpiohub_domain::id::DeviceId;
use gpiohub_domain::time::Timestamp;

/// Repository for persisting and querying [`Device`]s.
///
/// Implementations keep the pin catalog's `is_used` flag in step with the
/// device table: creating a device claims its pin and deleting it frees the
/// pin, each in a single transaction.
pub trait DeviceRepository {
    /// Insert a device and claim its pin. Assigns `id` and timestamps.
    ///
    /// Fails with `ValidationError::PinInUse` if another device holds the pin.
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, GpioHubError>> + Send;

    /// Get a device by its unique identifier.
    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, GpioHubError>> + Send;

    /// Get all devices, ordered by id.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, GpioHubError>> + Send;

    /// Persist a new on/off state. Fails with `NotFound` if the device is gone.
    fn update_state(
        &self,
        id: DeviceId,
        state: DeviceState,
        at: Timestamp,
    ) -> impl Future<Output = Result<Device, GpioHubError>> + Send;

    /// Delete a device and free its pin. Fails with `NotFound` if absent.
    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<(), GpioHubError>> + Send;
}
