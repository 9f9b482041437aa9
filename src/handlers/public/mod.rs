// handlers/public/mod.rs - endpoints that need no session

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / - service info
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "Boards API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health (public)",
            "boards_and_blocks": "/api/v1/boards-and-blocks (protected)",
            "boards": "/api/v1/boards[/:boardID], /api/v1/teams/:teamID/boards (protected)",
            "blocks": "/api/v1/boards/:boardID/blocks[/:blockID] (protected)",
            "tree": "/api/v1/boards/:boardID/blocks/export, .../blocks/import, .../blocks/:blockID/subtree (protected)"
        }
    }))
}

/// GET /health - store health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "store": "ok"
            })),
        ),
        Err(e) => {
            tracing::warn!("health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "store": "unavailable"
                })),
            )
        }
    }
}
