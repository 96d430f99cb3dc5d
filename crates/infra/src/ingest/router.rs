//! axum router accepting client bundles.
//!
//! Each lane section of a posted bundle becomes one job in the durable queue,
//! still sealed. Decryption happens later in the ingest loop.

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tracelane_core::server::JobQueue;
use tracelane_domain::constants::INGEST_PATH;
use tracelane_domain::{Result, TracelaneError, WireBundle};
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct IngestState {
    pub queue: Arc<dyn JobQueue>,
}

/// Router exposing `POST /report`.
pub fn ingest_router(queue: Arc<dyn JobQueue>) -> Router {
    Router::new().route(INGEST_PATH, post(receive_bundle)).with_state(IngestState { queue })
}

/// Serve the ingest router until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, queue: Arc<dyn JobQueue>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .map_err(|e| TracelaneError::Network(format!("failed to read listen address: {e}")))?;
    info!(%addr, path = INGEST_PATH, "ingest endpoint listening");

    axum::serve(listener, ingest_router(queue))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| TracelaneError::Network(format!("ingest server error: {e}")))
}

async fn receive_bundle(State(state): State<IngestState>, body: Bytes) -> Response {
    let bundle: WireBundle = match serde_json::from_slice(&body) {
        Ok(bundle) => bundle,
        Err(e) => return rejection(&format!("malformed bundle: {e}")),
    };
    let sections = match bundle.sections() {
        Ok(sections) => sections,
        Err(e) => return rejection(&e.to_string()),
    };

    let mut accepted = 0usize;
    for (lane, section) in sections {
        if section.is_empty() {
            continue;
        }
        let payload = match serde_json::to_string(section) {
            Ok(payload) => payload,
            Err(e) => return rejection(&format!("unencodable section: {e}")),
        };
        if let Err(e) = state.queue.add(lane, payload).await {
            error!(%lane, error = %e, "failed to enqueue bundle section");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "queue unavailable", "accepted": accepted })),
            )
                .into_response();
        }
        accepted += 1;
    }

    debug!(accepted, "bundle accepted");
    (StatusCode::ACCEPTED, Json(json!({ "accepted": accepted }))).into_response()
}

fn rejection(reason: &str) -> Response {
    warn!(reason, "bundle rejected");
    (StatusCode::BAD_REQUEST, Json(json!({ "error": reason }))).into_response()
}
