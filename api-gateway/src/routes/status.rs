use axum::{Json, extract::State};
use serde::Serialize;

use crate::routes::ApiError;
use crate::state::SharedState;

/// Latest committed checkpoint, or nulls before the first commit.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub block_number: Option<u64>,
    pub root_hash: Option<String>,
}

/// `GET /status`
pub async fn status(State(state): State<SharedState>) -> Result<Json<StatusResponse>, ApiError> {
    let latest = state.query.latest_checkpoint()?;
    Ok(Json(StatusResponse {
        block_number: latest.as_ref().map(|cp| cp.block_number),
        root_hash: latest.map(|cp| cp.digest.to_hex()),
    }))
}
