//! JSON handlers for the device registry and manual control.

use std::str::FromStr;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use gpiohub_app::ports::{ActionRepository, DeviceRepository, OutputLines, PinRepository};
use gpiohub_domain::device::{Device, DeviceState};
use gpiohub_domain::error::ValidationError;
use gpiohub_domain::id::DeviceId;
use gpiohub_domain::pin;

use super::{IdInput, MessageResponse, path_id};
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for registering a device.
#[derive(Deserialize)]
pub struct CreateDeviceRequest {
    #[serde(default)]
    pub name: String,
    pub icon: Option<String>,
    pub pin_number: Option<u8>,
}

/// Request body for `POST /device`.
#[derive(Deserialize)]
pub struct ControlRequest {
    pub device_id: Option<IdInput>,
    pub action: Option<String>,
}

/// A device together with the kernel line behind its pin.
#[derive(Debug, Serialize)]
pub struct DeviceView {
    #[serde(flatten)]
    pub device: Device,
    /// BCM line number; `None` if the pin has no line.
    pub gpio_line: Option<u8>,
}

impl From<Device> for DeviceView {
    fn from(device: Device) -> Self {
        let gpio_line = pin::physical_to_logical(device.pin).map(|line| line.0);
        Self { device, gpio_line }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedDevice {
    pub device_id: DeviceId,
}

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub message: String,
    pub device: DeviceView,
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<CreatedDevice>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// `GET /devices`
pub async fn list<DR, PR, AR, L>(
    State(state): State<AppState<DR, PR, AR, L>>,
) -> Result<Json<Vec<DeviceView>>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    let devices = state.device_service.list_devices().await?;
    Ok(Json(devices.into_iter().map(DeviceView::from).collect()))
}

/// `GET /devices/{id}`
pub async fn get<DR, PR, AR, L>(
    State(state): State<AppState<DR, PR, AR, L>>,
    Path(id): Path<String>,
) -> Result<Json<DeviceView>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    let device_id: DeviceId = path_id(&id)?;
    let device = state.device_service.get_device(device_id).await?;
    Ok(Json(device.into()))
}

/// `POST /devices`
pub async fn create<DR, PR, AR, L>(
    State(state): State<AppState<DR, PR, AR, L>>,
    body: Result<Json<CreateDeviceRequest>, JsonRejection>,
) -> Result<CreateResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    let Json(req) = body?;

    let mut builder = Device::builder().name(req.name);
    if let Some(icon) = req.icon {
        builder = builder.icon(icon);
    }
    if let Some(pin_number) = req.pin_number {
        builder = builder.pin(pin_number);
    }

    let device = builder.build()?;
    let created = state.device_service.add_device(device).await?;
    Ok(CreateResponse::Created(Json(CreatedDevice {
        device_id: created.id,
    })))
}

/// `DELETE /devices/{id}`
pub async fn delete<DR, PR, AR, L>(
    State(state): State<AppState<DR, PR, AR, L>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    let device_id: DeviceId = path_id(&id)?;
    state.device_service.remove_device(device_id).await?;
    Ok(Json(MessageResponse {
        message: format!("Device {device_id} removed"),
    }))
}

/// `POST /device`
///
/// Drives the line and persists the new state. An unknown device is a bad
/// request here, not a 404, because the id comes from the body.
pub async fn control<DR, PR, AR, L>(
    State(state): State<AppState<DR, PR, AR, L>>,
    body: Result<Json<ControlRequest>, JsonRejection>,
) -> Result<Json<ControlResponse>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    let Json(req) = body?;
    let device_id: DeviceId = req
        .device_id
        .ok_or(ValidationError::InvalidValue {
            field: "device_id",
            value: String::new(),
        })?
        .parse("device_id")?;
    let action = req.action.unwrap_or_default();
    let target = DeviceState::from_str(&action)?;

    let device = state
        .controller
        .set_state(device_id, target)
        .await
        .map_err(|err| ApiError::from(err).not_found_as_bad_request())?;
    Ok(Json(ControlResponse {
        message: format!("Device {device_id} turned {target}"),
        device: device.into(),
    }))
}
