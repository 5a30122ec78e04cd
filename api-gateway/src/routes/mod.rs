//! HTTP routes of the gateway.

use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use replica::QueryError;

use crate::state::SharedState;

pub mod balance;
pub mod health;
pub mod root_hash;
pub mod status;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/status", get(status::status))
        .route("/balance", get(balance::balance))
        .route("/rootHash", get(root_hash::root_hash))
        .with_state(state)
}

/// Status code plus a plain-text message.
#[derive(Debug)]
pub struct ApiError(StatusCode, String);

pub fn bad_request(msg: impl Into<String>) -> ApiError {
    ApiError(StatusCode::BAD_REQUEST, msg.into())
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        if err.is_client_error() {
            ApiError(StatusCode::BAD_REQUEST, err.to_string())
        } else {
            tracing::error!("query failed: {err}");
            ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use replica::genesis::apply_genesis;
    use replica::{
        Address, Balance, Checkpoint, GenesisConfig, LedgerStore, MemoryLedgerStore,
        QueryService, StateDigest,
    };

    use super::*;
    use crate::state::AppState;

    const ALICE: Address = Address([0xa1; 20]);

    /// Ledger funding ALICE with 100, checkpointed at block 10.
    fn app() -> (Router, MemoryLedgerStore, StateDigest) {
        let mut store = MemoryLedgerStore::new();
        let genesis = GenesisConfig {
            allocations: vec![(ALICE, Balance::from(100u32))],
        };
        apply_genesis(&mut store, &genesis).unwrap();
        let digest = store.digest().unwrap();
        store
            .commit(Some(&Checkpoint::pending(10, digest.clone()).commit()))
            .unwrap();

        let state = Arc::new(AppState {
            query: QueryService::new(store.committed_view()),
        });
        (router(state), store, digest)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (app, _store, _) = app();
        let (status, body) = get(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn balance_lookups() {
        let (app, _store, _) = app();

        let (status, body) = get(app.clone(), &format!("/balance?address={ALICE}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "100");

        let unknown = "b0".repeat(20);
        let (status, body) = get(app.clone(), &format!("/balance?address={unknown}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "0");

        let (status, _) = get(app.clone(), "/balance?address=0x1234").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(app, "/balance").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn root_hash_lookups() {
        let (app, _store, digest) = app();

        let (status, body) = get(app.clone(), "/rootHash?blockNumber=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, digest.to_hex());

        for uri in [
            "/rootHash?blockNumber=0",
            "/rootHash?blockNumber=-3",
            "/rootHash?blockNumber=11",
            "/rootHash?blockNumber=5",
            "/rootHash?blockNumber=ten",
            "/rootHash",
        ] {
            let (status, body) = get(app.clone(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(!body.is_empty(), "{uri} should explain the rejection");
        }
    }

    #[tokio::test]
    async fn status_reports_latest_checkpoint() {
        let (app, _store, digest) = app();
        let (status, body) = get(app, "/status").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["blockNumber"], 10);
        assert_eq!(json["rootHash"], digest.to_hex());
    }

    #[tokio::test]
    async fn status_before_first_commit_is_null() {
        let store = MemoryLedgerStore::new();
        let app = router(Arc::new(AppState {
            query: QueryService::new(store.committed_view()),
        }));

        let (status, body) = get(app, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"blockNumber":null,"rootHash":null}"#);
    }
}
