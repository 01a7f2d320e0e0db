//! HTTP route handlers exposing the capability object

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::{
    CompletionStatus, ScoContext, Score, ScoreWrite, ScormError, ScormState, SuspendData,
};

/// Error response for the bridge API
#[derive(Debug, Serialize)]
pub struct ScormErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<ScormError> for ScormErrorResponse {
    fn from(e: ScormError) -> Self {
        let code = match &e {
            ScormError::NotConnected => "not_connected",
            ScormError::BackendWriteRejected { .. } => "backend_write_rejected",
            ScormError::BackendConnectFailed => "backend_connect_failed",
            ScormError::BackendDisconnectFailed => "backend_disconnect_failed",
            ScormError::InvalidStatus(_) => "invalid_status",
            ScormError::ScoreRejected(_) => "score_rejected",
            ScormError::SuspendDataDecode(_) | ScormError::SuspendDataNotObject(_) => {
                "suspend_data_invalid"
            }
            ScormError::SuspendDataEncode(_) => "suspend_data_encode",
            ScormError::UnsupportedVersion(_) => "unsupported_version",
        };
        Self {
            error: e.to_string(),
            code: code.to_string(),
        }
    }
}

impl IntoResponse for ScormErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "not_connected" => StatusCode::CONFLICT,
            "invalid_status" | "unsupported_version" => StatusCode::BAD_REQUEST,
            "backend_write_rejected" | "score_rejected" => StatusCode::BAD_GATEWAY,
            "suspend_data_invalid" => StatusCode::UNPROCESSABLE_ENTITY,
            "backend_connect_failed" | "backend_disconnect_failed" => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

fn rejected(operation: &str) -> impl FnOnce(ScormError) -> ScormErrorResponse + '_ {
    move |e| {
        match &e {
            ScormError::NotConnected | ScormError::InvalidStatus(_) => {
                tracing::debug!("{} rejected: {}", operation, e);
            }
            _ => tracing::warn!("{} failed: {}", operation, e),
        }
        ScormErrorResponse::from(e)
    }
}

/// Body for PUT /suspend-data
#[derive(Debug, Default, Deserialize)]
pub struct SuspendDataRequest {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

/// Body for PUT /status
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
    #[serde(default)]
    pub defer_save: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub completion_status: CompletionStatus,
}

/// Body for PUT /field
#[derive(Debug, Deserialize)]
pub struct FieldWriteRequest {
    pub param: String,
    pub value: Value,
    #[serde(default)]
    pub defer_save: bool,
}

/// Query for GET /field
#[derive(Debug, Deserialize)]
pub struct FieldQuery {
    pub param: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FieldResponse {
    pub param: String,
    pub value: Option<String>,
}

/// GET /state - Current mirrored session state
pub async fn get_state(State(sco): State<ScoContext>) -> Json<ScormState> {
    Json(sco.scorm_state())
}

/// GET /suspend-data - Reload suspend data from the backend
pub async fn get_suspend_data(
    State(sco): State<ScoContext>,
) -> Result<Json<SuspendData>, ScormErrorResponse> {
    let data = sco
        .get_suspend_data()
        .await
        .map_err(rejected("get_suspend_data"))?;
    Ok(Json(data))
}

/// PUT /suspend-data - Merge one key into the suspend data
pub async fn put_suspend_data(
    State(sco): State<ScoContext>,
    Json(req): Json<SuspendDataRequest>,
) -> Result<Json<SuspendData>, ScormErrorResponse> {
    let data = sco
        .set_suspend_data(req.key.as_deref(), req.value)
        .await
        .map_err(rejected("set_suspend_data"))?;
    Ok(Json(data))
}

/// DELETE /suspend-data - Reset suspend data to an empty object
pub async fn delete_suspend_data(
    State(sco): State<ScoContext>,
) -> Result<Json<SuspendData>, ScormErrorResponse> {
    let data = sco
        .clear_suspend_data()
        .await
        .map_err(rejected("clear_suspend_data"))?;
    Ok(Json(data))
}

/// PUT /status - Set the completion status
pub async fn put_status(
    State(sco): State<ScoContext>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<StatusResponse>, ScormErrorResponse> {
    let completion_status = sco
        .set_status(&req.status, req.defer_save)
        .await
        .map_err(rejected("set_status"))?;
    Ok(Json(StatusResponse { completion_status }))
}

/// PUT /score - Record a score and optional status with a single save
pub async fn put_score(
    State(sco): State<ScoContext>,
    Json(score): Json<Score>,
) -> Result<Json<Vec<ScoreWrite>>, ScormErrorResponse> {
    let writes = sco.set_score(score).await.map_err(rejected("set_score"))?;
    Ok(Json(writes))
}

/// GET /field?param= - Read a data-model field
pub async fn get_field(
    State(sco): State<ScoContext>,
    Query(query): Query<FieldQuery>,
) -> Json<FieldResponse> {
    let value = sco.get(&query.param);
    Json(FieldResponse {
        param: query.param,
        value,
    })
}

/// PUT /field - Write a data-model field
pub async fn put_field(
    State(sco): State<ScoContext>,
    Json(req): Json<FieldWriteRequest>,
) -> Result<Json<FieldResponse>, ScormErrorResponse> {
    // Strings go to the backend unquoted; anything else as its JSON text
    let value = match req.value {
        Value::String(s) => s,
        other => other.to_string(),
    };
    let (param, value) = sco
        .set(&req.param, value, req.defer_save)
        .await
        .map_err(rejected("set"))?;
    Ok(Json(FieldResponse {
        param,
        value: Some(value),
    }))
}

/// Create the bridge router
pub fn scorm_routes(sco: ScoContext) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route(
            "/suspend-data",
            get(get_suspend_data)
                .put(put_suspend_data)
                .delete(delete_suspend_data),
        )
        .route("/status", put(put_status))
        .route("/score", put(put_score))
        .route("/field", get(get_field).put(put_field))
        .with_state(sco)
}
