//! Live-session listing endpoints

use std::collections::BTreeMap;

use assist_shared::SessionInfo;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::state::AppState;

/// Every response body is wrapped as `{"data": ...}`
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

fn data<T>(data: T) -> Json<DataResponse<T>> {
    Json(DataResponse { data })
}

/// GET /sockets-list
pub async fn list_all(
    State(state): State<AppState>,
) -> Json<DataResponse<BTreeMap<String, Vec<String>>>> {
    data(state.ws_state.projection.session_ids_by_project().await)
}

/// GET /sockets-list/:project_key
pub async fn list_project(
    State(state): State<AppState>,
    Path(project_key): Path<String>,
) -> Json<DataResponse<Vec<String>>> {
    data(state.ws_state.projection.session_ids(&project_key).await)
}

/// GET /sockets-list/:project_key/:session_id
pub async fn list_session(
    State(state): State<AppState>,
    Path((project_key, session_id)): Path<(String, String)>,
) -> Json<DataResponse<Option<String>>> {
    data(
        state
            .ws_state
            .projection
            .find_session_id(&project_key, &session_id)
            .await,
    )
}

/// GET /sockets-live
pub async fn live_all(
    State(state): State<AppState>,
) -> Json<DataResponse<BTreeMap<String, Vec<SessionInfo>>>> {
    data(state.ws_state.projection.live_by_project().await)
}

/// GET /sockets-live/:project_key
pub async fn live_project(
    State(state): State<AppState>,
    Path(project_key): Path<String>,
) -> Json<DataResponse<Vec<SessionInfo>>> {
    data(state.ws_state.projection.live(&project_key).await)
}

/// GET /sockets-live/:project_key/:session_id
pub async fn live_session(
    State(state): State<AppState>,
    Path((project_key, session_id)): Path<(String, String)>,
) -> Json<DataResponse<Option<SessionInfo>>> {
    data(
        state
            .ws_state
            .projection
            .live_session(&project_key, &session_id)
            .await,
    )
}
