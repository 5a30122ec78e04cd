use axum::extract::{Query, State};
use serde::Deserialize;

use crate::routes::{ApiError, bad_request};
use crate::state::SharedState;

/// Kept as text so that non-numeric input gets our own 400 message.
#[derive(Debug, Deserialize)]
pub struct RootHashParams {
    #[serde(rename = "blockNumber")]
    pub block_number: Option<String>,
}

/// `GET /rootHash?blockNumber=<integer>`
///
/// Hex digest of the checkpoint committed at `blockNumber`. Peer replicas
/// call this during quorum validation.
pub async fn root_hash(
    State(state): State<SharedState>,
    Query(params): Query<RootHashParams>,
) -> Result<String, ApiError> {
    let raw = params
        .block_number
        .ok_or_else(|| bad_request("missing `blockNumber` query parameter"))?;
    let block_number: i64 = raw
        .trim()
        .parse()
        .map_err(|_| bad_request(format!("blockNumber must be an integer, got {raw:?}")))?;

    let digest = state.query.root_hash(block_number)?;
    Ok(digest.to_hex())
}
