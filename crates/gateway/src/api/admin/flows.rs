//! Admin-gated flow surface (ambient, §6 supplement): inspect a flow's
//! authored IR and drive the flow-modification executor (C12) directly,
//! outside the LLM feedback loop — for an operator tool rather than an
//! end user's `modify_flow` request.

use axum::extract::{Path, State};
use axum::Json;
use flowline_executor::{apply_batch, propose_edits};
use flowline_flow::ir::Flow;
use serde::{Deserialize, Serialize};

use crate::api::admin::guard::AdminGuard;
use crate::error::ApiError;
use crate::state::AppState;
use flowline_domain::Error;

pub async fn get_flow(_guard: AdminGuard, State(state): State<AppState>, Path(flow_id): Path<String>) -> Result<Json<Flow>, ApiError> {
    state.flows.ir(&flow_id).map(Json).ok_or_else(|| ApiError(Error::Other(format!("unknown flow '{flow_id}'"))))
}

#[derive(Debug, Deserialize)]
pub struct ModifyFlowRequest {
    pub instruction: String,
}

#[derive(Debug, Serialize)]
pub struct ModifyFlowResponse {
    pub flow_id: String,
    pub new_version: u32,
}

pub async fn modify_flow(
    _guard: AdminGuard,
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
    Json(request): Json<ModifyFlowRequest>,
) -> Result<Json<ModifyFlowResponse>, ApiError> {
    let current = state.flows.ir(&flow_id).ok_or_else(|| ApiError(Error::Other(format!("unknown flow '{flow_id}'"))))?;

    let edits = propose_edits(state.llm.as_ref(), &state.config.llm.model, &current, &request.instruction)
        .await
        .map_err(|e| ApiError(Error::ExternalAction(e)))?;

    let updated = apply_batch(&current, &edits)?;
    let new_version = updated.version;
    state.flows.insert(updated)?;

    flowline_domain::trace::TraceEvent::FlowModified { flow_id: flow_id.clone(), new_version }.emit();

    Ok(Json(ModifyFlowResponse { flow_id, new_version }))
}
