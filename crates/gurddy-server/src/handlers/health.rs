use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app_state::AppState;

/// Liveness probe with the number of open sessions.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.sessions.len().await,
    }))
}
