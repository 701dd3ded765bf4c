//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod actions;
#[allow(clippy::missing_errors_doc)]
pub mod devices;
#[allow(clippy::missing_errors_doc)]
pub mod pins;

use std::str::FromStr;

use axum::Router;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};

use gpiohub_app::ports::{ActionRepository, DeviceRepository, OutputLines, PinRepository};

use crate::error::ApiError;
use crate::state::AppState;

/// Build the API router.
pub fn routes<DR, PR, AR, L>() -> Router<AppState<DR, PR, AR, L>>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    Router::new()
        // Devices
        .route(
            "/devices",
            get(devices::list::<DR, PR, AR, L>).post(devices::create::<DR, PR, AR, L>),
        )
        .route(
            "/devices/{id}",
            get(devices::get::<DR, PR, AR, L>).delete(devices::delete::<DR, PR, AR, L>),
        )
        .route("/device", post(devices::control::<DR, PR, AR, L>))
        // Pins
        .route("/pins", get(pins::list::<DR, PR, AR, L>))
        .route("/pins/usable", get(pins::usable::<DR, PR, AR, L>))
        // Actions
        .route(
            "/actions",
            get(actions::list::<DR, PR, AR, L>).post(actions::create::<DR, PR, AR, L>),
        )
        .route(
            "/actions/scheduler/status",
            get(actions::scheduler_status::<DR, PR, AR, L>),
        )
        .route(
            "/actions/{id}",
            get(actions::get::<DR, PR, AR, L>)
                .put(actions::update::<DR, PR, AR, L>)
                .delete(actions::delete::<DR, PR, AR, L>),
        )
        .route("/actions/{id}/toggle", post(actions::toggle::<DR, PR, AR, L>))
        .route(
            "/actions/{id}/execute",
            post(actions::execute::<DR, PR, AR, L>),
        )
        .route("/actions/{id}/logs", get(actions::logs::<DR, PR, AR, L>))
}

/// An identifier sent in a JSON body, either as a number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdInput {
    Number(i64),
    Text(String),
}

impl IdInput {
    fn parse<T>(&self, field: &'static str) -> Result<T, ApiError>
    where
        T: FromStr + From<i64>,
    {
        match self {
            Self::Number(raw) => Ok(T::from(*raw)),
            Self::Text(raw) => T::from_str(raw).map_err(|_| {
                ApiError::from(gpiohub_domain::error::ValidationError::InvalidValue {
                    field,
                    value: raw.clone(),
                })
            }),
        }
    }
}

/// Parse an `{id}` path segment.
fn path_id<T: FromStr>(raw: &str) -> Result<T, ApiError> {
    T::from_str(raw).map_err(|_| ApiError::invalid_id(raw))
}

/// `{"message": ...}` acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
