use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::db::{DbInfo, Manager, ManagerError};

#[derive(Clone)]
pub struct GatewayState {
    pub manager: Arc<Manager>,
    pub url: Url,
}

#[derive(Serialize)]
pub struct GatewayStatus {
    pub version: &'static str,
    pub url: String,
}

/// Manager errors rendered as JSON with a matching status code.
pub struct ApiError(ManagerError);

impl From<ManagerError> for ApiError {
    fn from(err: ManagerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ManagerError::NotFound(_) => StatusCode::NOT_FOUND,
            ManagerError::InvalidName(_) | ManagerError::InvalidInstance(_) => StatusCode::BAD_REQUEST,
            ManagerError::Store(_) | ManagerError::Encoding(_) => {
                tracing::error!(error = %self.0, "Gateway lookup failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn get_status(State(state): State<GatewayState>) -> Json<GatewayStatus> {
    Json(GatewayStatus {
        version: env!("CARGO_PKG_VERSION"),
        url: state.url.to_string(),
    })
}

pub async fn get_thread(
    State(state): State<GatewayState>,
    Path(thread): Path<String>,
) -> Result<Json<DbInfo>, ApiError> {
    Ok(Json(state.manager.get_db(&thread).await?))
}

pub async fn get_collection(
    State(state): State<GatewayState>,
    Path((thread, collection)): Path<(String, String)>,
) -> Result<Json<Vec<Value>>, ApiError> {
    Ok(Json(state.manager.list_instances(&thread, &collection).await?))
}

pub async fn get_instance(
    State(state): State<GatewayState>,
    Path((thread, collection, id)): Path<(String, String, String)>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.manager.find_by_id(&thread, &collection, &id).await?))
}
