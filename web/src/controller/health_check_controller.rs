use super::ApiResponse;
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct Health {
    status: &'static str,
    subscribers: usize,
    broadcast_loop: String,
}

/// GET /health
pub(crate) async fn health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    let manager = &app_state.sse_manager;
    let health = Health {
        status: "healthy",
        subscribers: manager.registry().len().await,
        broadcast_loop: format!("{:?}", manager.state()),
    };

    (
        StatusCode::OK,
        Json(ApiResponse::new(StatusCode::OK.into(), health)),
    )
}
