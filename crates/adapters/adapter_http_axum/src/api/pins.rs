//! JSON handlers for the header pin catalog.

use axum::Json;
use axum::extract::State;

use gpiohub_app::ports::{ActionRepository, DeviceRepository, OutputLines, PinRepository};
use gpiohub_domain::pin::GpioPin;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /pins`
pub async fn list<DR, PR, AR, L>(
    State(state): State<AppState<DR, PR, AR, L>>,
) -> Result<Json<Vec<GpioPin>>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    Ok(Json(state.pin_service.list_pins().await?))
}

/// `GET /pins/usable`
pub async fn usable<DR, PR, AR, L>(
    State(state): State<AppState<DR, PR, AR, L>>,
) -> Result<Json<Vec<GpioPin>>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    Ok(Json(state.pin_service.list_usable_pins().await?))
}
