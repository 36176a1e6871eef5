//! Status HTTP server.
//!
//! Exposes:
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /status` - committed ledger tip and whether it is synced up

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use gateway_mempool::{is_ledger_synced_up, MempoolConfig};
use gateway_types::Clock;

use crate::ledger_confirmation::LedgerConfirmation;
use crate::metrics::GatewayMetrics;
use crate::GatewayError;

/// Body of `GET /status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub state_version: u64,
    pub round_timestamp_ms: u64,
    pub synced_up: bool,
}

#[derive(Clone)]
pub struct StatusState {
    pub metrics: Arc<GatewayMetrics>,
    pub ledger: Arc<LedgerConfirmation>,
    pub clock: Arc<dyn Clock>,
    pub mempool: MempoolConfig,
}

pub fn create_router(state: StatusState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

/// Serve the status endpoints until `token` is cancelled.
pub async fn serve(port: u16, state: StatusState, token: CancellationToken) -> Result<(), GatewayError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(port, "status server listening on http://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(token.cancelled_owned())
        .await
        .map_err(|e| GatewayError::StatusServer(e.to_string()))
}

async fn metrics_handler(State(state): State<StatusState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

async fn status_handler(State(state): State<StatusState>) -> Json<SyncStatus> {
    let tip = state.ledger.committed_tip();
    let synced_up = is_ledger_synced_up(tip.round_timestamp, state.clock.now(), &state.mempool);
    Json(SyncStatus {
        state_version: tip.state_version,
        round_timestamp_ms: tip.round_timestamp.as_millis(),
        synced_up,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use gateway_consensus::{LedgerConfirmationConfig, TrustRegistry};
    use gateway_nullables::{NullClock, NullStore};
    use tower::ServiceExt;

    fn test_state() -> StatusState {
        let metrics = Arc::new(GatewayMetrics::new());
        let clock = Arc::new(NullClock::from_secs(1_000));
        let ledger = LedgerConfirmation::new(
            Arc::new(TrustRegistry::default()),
            LedgerConfirmationConfig::default(),
            Arc::new(NullStore::new()),
            clock.clone(),
            metrics.clone(),
        )
        .unwrap();
        StatusState {
            metrics,
            ledger: Arc::new(ledger),
            clock,
            mempool: MempoolConfig::default(),
        }
    }

    #[tokio::test]
    async fn status_reports_pre_genesis_as_not_synced() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let status: SyncStatus = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            status,
            SyncStatus {
                state_version: 0,
                round_timestamp_ms: 0,
                synced_up: false,
            }
        );
    }

    #[tokio::test]
    async fn metrics_are_exposed_as_text() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("gateway_ledger_sync_quorum_exists_status"));
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
