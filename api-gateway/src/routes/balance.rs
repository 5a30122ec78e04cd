use axum::extract::{Query, State};
use serde::Deserialize;

use crate::routes::{ApiError, bad_request};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct BalanceParams {
    pub address: Option<String>,
}

/// `GET /balance?address=<hex>`
///
/// Committed balance as a plain decimal string. Unknown accounts hold `0`.
pub async fn balance(
    State(state): State<SharedState>,
    Query(params): Query<BalanceParams>,
) -> Result<String, ApiError> {
    let address = params
        .address
        .ok_or_else(|| bad_request("missing `address` query parameter"))?;

    let balance = state.query.balance_of_hex(address.trim())?;
    Ok(balance.to_string())
}
