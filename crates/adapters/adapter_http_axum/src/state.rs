//! Shared application state for axum handlers.

use std::sync::Arc;

use gpiohub_app::ports::{ActionRepository, DeviceRepository, OutputLines, PinRepository};
use gpiohub_app::services::action_service::ActionService;
use gpiohub_app::services::device_controller::DeviceController;
use gpiohub_app::services::device_service::DeviceService;
use gpiohub_app::services::pin_service::PinService;

/// Application state shared across all axum handlers.
///
/// Generic over the device, pin and action repositories and the GPIO line
/// backend to avoid dynamic dispatch. `Clone` is implemented manually so the
/// underlying types themselves do not need to be `Clone`; only the `Arc`
/// wrappers are cloned.
pub struct AppState<DR, PR, AR, L> {
    /// Device registry.
    pub device_service: Arc<DeviceService<DR, PR>>,
    /// Pin catalog queries.
    pub pin_service: Arc<PinService<PR>>,
    /// Manual on/off control; shared with the scheduler's executor.
    pub controller: Arc<DeviceController<DR, L>>,
    /// Action CRUD and scheduler control.
    pub action_service: Arc<ActionService<AR, DR, L>>,
}

impl<DR, PR, AR, L> Clone for AppState<DR, PR, AR, L> {
    fn clone(&self) -> Self {
        Self {
            device_service: Arc::clone(&self.device_service),
            pin_service: Arc::clone(&self.pin_service),
            controller: Arc::clone(&self.controller),
            action_service: Arc::clone(&self.action_service),
        }
    }
}

impl<DR, PR, AR, L> AppState<DR, PR, AR, L>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    /// Create a new application state from services.
    ///
    /// The controller is taken as an `Arc` because the scheduler's executor
    /// holds the same instance; both must serialise writes through one lock.
    pub fn new(
        device_service: DeviceService<DR, PR>,
        pin_service: PinService<PR>,
        controller: Arc<DeviceController<DR, L>>,
        action_service: ActionService<AR, DR, L>,
    ) -> Self {
        Self {
            device_service: Arc::new(device_service),
            pin_service: Arc::new(pin_service),
            controller,
            action_service: Arc::new(action_service),
        }
    }
}
