pub mod customers;
pub mod playbooks;

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::AppState;

pub async fn root() -> &'static str {
    "Tend CRM API"
}

pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let db_healthy = crate::database::health_check(&state.db_pool).await;
    let status = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if db_healthy { "healthy" } else { "degraded" },
            "database": db_healthy,
            "websocket_connections": state.ws_manager.connection_count().await,
            "timestamp": chrono::Utc::now(),
        })),
    )
}
