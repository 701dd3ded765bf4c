//! Pin service: queries over the header pin catalog.

use gpiohub_domain::error::{GpioHubError, NotFoundError};
use gpiohub_domain::pin::GpioPin;

use crate::ports::PinRepository;

pub struct PinService<PR> {
    pins: PR,
}

impl<PR: PinRepository> PinService<PR> {
    pub fn new(pins: PR) -> Self {
        Self { pins }
    }

    /// Every pin on the header.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_pins(&self) -> Result<Vec<GpioPin>, GpioHubError> {
        self.pins.get_all().await
    }

    /// GPIO pins that a new device may use.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_usable_pins(&self) -> Result<Vec<GpioPin>, GpioHubError> {
        self.pins.get_usable().await
    }

    /// # Errors
    ///
    /// Returns [`GpioHubError::NotFound`] for an unknown pin number.
    pub async fn get_pin(&self, pin_number: u8) -> Result<GpioPin, GpioHubError> {
        self.pins.get(pin_number).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Pin",
                id: pin_number.to_string(),
            }
            .into()
        })
    }
}
