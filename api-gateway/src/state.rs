//! Shared application state.

use std::sync::Arc;

use replica::QueryService;

/// State handed to request handlers via Axum's `State` extractor.
pub struct AppState {
    /// Reads against the embedded replica's committed ledger.
    pub query: QueryService,
}

pub type SharedState = Arc<AppState>;
