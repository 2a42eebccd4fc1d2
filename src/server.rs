use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, info};

use crate::fetcher::EtherscanFetcher;

pub const FETCH_EVENTS_PATH: &str = "/api/fetch-events";

pub fn router(fetcher: Arc<EtherscanFetcher>) -> Router {
    Router::new()
        .route(
            FETCH_EVENTS_PATH,
            post(fetch_events).fallback(method_not_allowed),
        )
        .with_state(fetcher)
}

async fn fetch_events(State(fetcher): State<Arc<EtherscanFetcher>>) -> Response {
    match fetcher.fetch().await {
        Ok(fetched) => (StatusCode::OK, Json(fetched)).into_response(),
        Err(e) => {
            error!("fetch-events failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Only POST allowed" })),
    )
        .into_response()
}

pub async fn serve(bind: &str, fetcher: Arc<EtherscanFetcher>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Serving {} on {}", FETCH_EVENTS_PATH, listener.local_addr()?);
    axum::serve(listener, router(fetcher)).await
}
