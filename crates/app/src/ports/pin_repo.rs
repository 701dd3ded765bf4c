//! Pin repository port: read access to the GPIO pin catalog.

use std::future::Future;

use gpiohub_domain::error::GpioHubError;
use gpiohub_domain::pin::GpioPin;

/// Read-only view of the header pin catalog.
pub trait PinRepository {
    /// Get a single pin by its physical number.
    fn get(&self, pin_number: u8)
    -> impl Future<Output = Result<Option<GpioPin>, GpioHubError>> + Send;

    /// Every pin on the header, ordered by pin number.
    fn get_all(&self) -> impl Future<Output = Result<Vec<GpioPin>, GpioHubError>> + Send;

    /// GPIO pins not claimed by any device, ordered by pin number.
    fn get_usable(&self) -> impl Future<Output = Result<Vec<GpioPin>, GpioHubError>> + Send;
}
