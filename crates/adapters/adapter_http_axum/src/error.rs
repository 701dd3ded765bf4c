//! HTTP error response mapping.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use gpiohub_domain::error::{GpioHubError, ValidationError};

/// JSON error body returned by every endpoint.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`GpioHubError`] and extractor rejections to an HTTP response.
#[derive(Debug)]
pub enum ApiError {
    Domain(GpioHubError),
    /// The request could not be decoded at all.
    Malformed(String),
    /// A lookup miss reported as a client error rather than 404.
    BadReference(String),
}

impl ApiError {
    /// Report "not found" as 400, for routes where the id comes from the body.
    #[must_use]
    pub fn not_found_as_bad_request(self) -> Self {
        match self {
            Self::Domain(GpioHubError::NotFound(err)) => Self::BadReference(err.to_string()),
            other => other,
        }
    }

    /// A path segment that is not a valid identifier.
    #[must_use]
    pub fn invalid_id(raw: &str) -> Self {
        Self::Domain(
            ValidationError::InvalidValue {
                field: "id",
                value: raw.to_string(),
            }
            .into(),
        )
    }
}

impl From<GpioHubError> for ApiError {
    fn from(err: GpioHubError) -> Self {
        Self::Domain(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Domain(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Malformed(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Malformed(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Malformed(message) | Self::BadReference(message) => {
                (StatusCode::BAD_REQUEST, message)
            }
            Self::Domain(err) => match &err {
                GpioHubError::Validation(_) | GpioHubError::Schedule(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                GpioHubError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                GpioHubError::Conflict(_) => (StatusCode::CONFLICT, err.to_string()),
                GpioHubError::Device(fault) => {
                    tracing::warn!(error = %fault, "device fault");
                    (StatusCode::BAD_GATEWAY, err.to_string())
                }
                GpioHubError::Storage(inner) => {
                    tracing::error!(error = %inner, "storage error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_string(),
                    )
                }
            },
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
