use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{
    FlowError,
    common::Vars,
    events::Envelope,
    model::{Execution, WorkflowModel},
};

use super::{connection, server::AppState};

/// A [`FlowError`] rendered as `{"error": message}` with a matching status code.
pub struct ApiError(FlowError);

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            FlowError::NotFound(_) => StatusCode::NOT_FOUND,
            FlowError::Validation(_) | FlowError::Convert(_) | FlowError::Config(_) => StatusCode::BAD_REQUEST,
            FlowError::Execution(_) => StatusCode::CONFLICT,
            FlowError::Engine(_) => StatusCode::SERVICE_UNAVAILABLE,
            FlowError::Store(_) | FlowError::Queue(_) | FlowError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": if state.engine.is_running() { "ok" } else { "stopped" },
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// POST /api/workflows
pub async fn deploy_workflow(
    State(state): State<Arc<AppState>>,
    Json(workflow): Json<WorkflowModel>,
) -> ApiResult<Value> {
    let created = state.engine.deploy(&workflow)?;
    info!(workflow_id = %workflow.id, created, "workflow deployed");
    Ok(Json(json!({ "workflowId": workflow.id, "created": created })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTriggerBody {
    pub workflow_id: String,
}

// POST /api/triggers/{id}
pub async fn register_trigger(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RegisterTriggerBody>,
) -> ApiResult<Value> {
    let created = state.engine.register_trigger(&id, &body.workflow_id)?;
    Ok(Json(json!({ "triggerId": id, "workflowId": body.workflow_id, "created": created })))
}

#[derive(Deserialize)]
pub struct ExecuteTriggerBody {
    #[serde(default)]
    pub inputs: Vars,
}

// POST /api/triggers/{id}/execute
pub async fn execute_trigger(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ExecuteTriggerBody>,
) -> ApiResult<Value> {
    let (execution_id, status) = state.engine.execute_trigger(&id, body.inputs)?;
    Ok(Json(json!({ "executionId": execution_id, "status": status })))
}

#[derive(Deserialize)]
pub struct CreateExecutionBody {
    pub workflow: WorkflowModel,
    #[serde(default)]
    pub inputs: Vars,
}

// POST /api/executions
pub async fn create_execution(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateExecutionBody>,
) -> ApiResult<Value> {
    let execution_id = state.engine.execute_workflow(&body.workflow, body.inputs)?;
    Ok(Json(json!({ "executionId": execution_id })))
}

// GET /api/executions
pub async fn running_executions(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "executions": state.engine.running_executions() }))
}

// GET /api/executions/{id}
pub async fn get_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Execution> {
    Ok(Json(state.engine.get_execution(&id)?))
}

// GET /api/executions/{id}/events
pub async fn execution_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Envelope>> {
    Ok(Json(state.engine.execution_history(&id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitInputBody {
    pub response: Value,
    #[serde(default)]
    pub node_id: Option<String>,
}

// POST /api/executions/{id}/input
pub async fn submit_input(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SubmitInputBody>,
) -> ApiResult<Value> {
    state.engine.submit_user_input(&id, body.response, body.node_id.as_deref())?;
    Ok(Json(json!({ "accepted": true })))
}

// POST /api/executions/{id}/cancel
pub async fn cancel_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    state.engine.cancel(&id)?;
    Ok(Json(json!({ "cancelled": true })))
}

// GET /ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(
    socket: WebSocket,
    state: Arc<AppState>,
) {
    info!("websocket client connected");
    connection::handle_connection(socket, state.engine.clone()).await;
    debug!("websocket client disconnected");
}
