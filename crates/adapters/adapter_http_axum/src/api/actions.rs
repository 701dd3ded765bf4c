//! JSON handlers for actions and the scheduler.

use std::str::FromStr;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use gpiohub_app::ports::{ActionRepository, DeviceRepository, OutputLines, PinRepository};
use gpiohub_app::scheduler::SchedulerStatus;
use gpiohub_domain::action::{
    Action, ActionKind, DeviceStep, ExecutionLogEntry, Parameters, StepType,
};
use gpiohub_domain::error::ValidationError;
use gpiohub_domain::id::{ActionId, DeviceId};
use gpiohub_domain::time::Timestamp;

use super::{IdInput, MessageResponse, path_id};
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for creating or replacing an action.
///
/// The kind may be sent as `type` (the original field name) or `kind`.
#[derive(Deserialize)]
pub struct ActionRequest {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: Option<String>,
    #[serde(default)]
    pub schedule: String,
    pub parameters: Option<Parameters>,
    pub enabled: Option<bool>,
    #[serde(default)]
    pub devices: Vec<StepRequest>,
}

#[derive(Deserialize)]
pub struct StepRequest {
    pub device_id: Option<IdInput>,
    pub action_type: Option<String>,
    pub delay_seconds: Option<u32>,
}

impl StepRequest {
    fn into_step(self, index: usize) -> Result<DeviceStep, ApiError> {
        let device_id: DeviceId = self
            .device_id
            .ok_or(ValidationError::IncompleteStep {
                index,
                field: "device_id",
            })?
            .parse("device_id")?;
        let action_type = self.action_type.ok_or(ValidationError::IncompleteStep {
            index,
            field: "action_type",
        })?;
        Ok(DeviceStep::new(
            device_id,
            StepType::from_str(&action_type)?,
            self.delay_seconds.unwrap_or_default(),
        ))
    }
}

impl ActionRequest {
    fn into_action(self) -> Result<Action, ApiError> {
        let mut builder = Action::builder()
            .name(self.name)
            .schedule(self.schedule)
            .parameters(self.parameters.unwrap_or_default());
        if let Some(kind) = self.kind {
            builder = builder.kind(ActionKind::from_str(&kind)?);
        }
        if let Some(enabled) = self.enabled {
            builder = builder.enabled(enabled);
        }
        for (index, step) in self.devices.into_iter().enumerate() {
            builder = builder.step(step.into_step(index)?);
        }
        Ok(builder.build()?)
    }
}

#[derive(Deserialize)]
pub struct LogsQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: ActionId,
    pub name: String,
    pub next_run: Option<Timestamp>,
    pub trigger_description: String,
}

#[derive(Debug, Serialize)]
pub struct SchedulerStatusView {
    pub running: bool,
    pub jobs: Vec<JobView>,
}

impl From<SchedulerStatus> for SchedulerStatusView {
    fn from(status: SchedulerStatus) -> Self {
        Self {
            running: status.running,
            jobs: status
                .jobs
                .into_iter()
                .map(|job| JobView {
                    id: job.action_id,
                    name: job.name,
                    next_run: job.next_run,
                    trigger_description: job.trigger,
                })
                .collect(),
        }
    }
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<Action>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// `GET /actions`
pub async fn list<DR, PR, AR, L>(
    State(state): State<AppState<DR, PR, AR, L>>,
) -> Result<Json<Vec<Action>>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    Ok(Json(state.action_service.list_actions().await?))
}

/// `GET /actions/{id}`
pub async fn get<DR, PR, AR, L>(
    State(state): State<AppState<DR, PR, AR, L>>,
    Path(id): Path<String>,
) -> Result<Json<Action>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    let action_id: ActionId = path_id(&id)?;
    Ok(Json(state.action_service.get_action(action_id).await?))
}

/// `POST /actions`
pub async fn create<DR, PR, AR, L>(
    State(state): State<AppState<DR, PR, AR, L>>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<CreateResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    let Json(req) = body?;
    let action = req.into_action()?;
    let created = state.action_service.create_action(action).await?;
    Ok(CreateResponse::Created(Json(created)))
}

/// `PUT /actions/{id}`
pub async fn update<DR, PR, AR, L>(
    State(state): State<AppState<DR, PR, AR, L>>,
    Path(id): Path<String>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<Action>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    let action_id: ActionId = path_id(&id)?;
    let Json(req) = body?;
    let action = req.into_action()?;
    Ok(Json(
        state.action_service.update_action(action_id, action).await?,
    ))
}

/// `DELETE /actions/{id}`
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
    let action_id: ActionId = path_id(&id)?;
    state.action_service.delete_action(action_id).await?;
    Ok(Json(MessageResponse {
        message: format!("Action {action_id} deleted"),
    }))
}

/// `POST /actions/{id}/toggle`
pub async fn toggle<DR, PR, AR, L>(
    State(state): State<AppState<DR, PR, AR, L>>,
    Path(id): Path<String>,
) -> Result<Json<Action>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    let action_id: ActionId = path_id(&id)?;
    Ok(Json(state.action_service.toggle_action(action_id).await?))
}

/// `POST /actions/{id}/execute`
///
/// Runs the action to completion, delays included, and returns its log entry.
pub async fn execute<DR, PR, AR, L>(
    State(state): State<AppState<DR, PR, AR, L>>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionLogEntry>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    let action_id: ActionId = path_id(&id)?;
    Ok(Json(state.action_service.execute_action(action_id).await?))
}

/// `GET /actions/{id}/logs?limit=N`
pub async fn logs<DR, PR, AR, L>(
    State(state): State<AppState<DR, PR, AR, L>>,
    Path(id): Path<String>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<Vec<ExecutionLogEntry>>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    let action_id: ActionId = path_id(&id)?;
    let Query(query) = query?;
    Ok(Json(
        state.action_service.logs(action_id, query.limit).await?,
    ))
}

/// `GET /actions/scheduler/status`
pub async fn scheduler_status<DR, PR, AR, L>(
    State(state): State<AppState<DR, PR, AR, L>>,
) -> Json<SchedulerStatusView>
where
    DR: DeviceRepository + Send + Sync + 'static,
    PR: PinRepository + Send + Sync + 'static,
    AR: ActionRepository + Send + Sync + 'static,
    L: OutputLines + Send + Sync + 'static,
{
    Json(state.action_service.scheduler_status().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> ActionRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn should_accept_type_or_kind_for_action_kind() {
        let by_type = request(serde_json::json!({
            "name": "Fan", "type": "interval", "schedule": "5m",
            "devices": [{"device_id": 1, "action_type": "toggle"}]
        }));
        let by_kind = request(serde_json::json!({
            "name": "Fan", "kind": "interval", "schedule": "5m",
            "devices": [{"device_id": "1", "action_type": "toggle"}]
        }));

        let a = by_type.into_action().unwrap();
        let b = by_kind.into_action().unwrap();
        assert_eq!(a.kind, ActionKind::Interval);
        assert_eq!(a, b);
        assert_eq!(a.steps[0].delay_seconds, 0);
        assert!(a.enabled);
    }

    #[test]
    fn should_report_step_missing_action_type() {
        let req = request(serde_json::json!({
            "name": "Fan", "type": "timer", "schedule": "0 7 * * *",
            "devices": [{"device_id": 1, "action_type": "high"}, {"device_id": 2}]
        }));

        let err = req.into_action().unwrap_err();
        assert!(matches!(
            err,
            ApiError::Domain(gpiohub_domain::error::GpioHubError::Validation(
                ValidationError::IncompleteStep {
                    index: 1,
                    field: "action_type"
                }
            ))
        ));
    }

    #[test]
    fn should_reject_unknown_kind() {
        let req = request(serde_json::json!({
            "name": "Fan", "type": "weekly", "schedule": "x",
            "devices": [{"device_id": 1, "action_type": "high"}]
        }));
        assert!(req.into_action().is_err());
    }
}
