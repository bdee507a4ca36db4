//! Liveness endpoint (ambient, §6 supplement).

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn healthz(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "flows_loaded": state.flows.ids().len(),
    }))
}
