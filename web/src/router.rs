use crate::{
    controller::{broadcast_controller, health_check_controller},
    sse::handler,
    AppState,
};
use axum::{
    routing::{get, post},
    Router,
};
use service::config::Config;
use tower_http::services::ServeDir;

pub fn define_routes(app_state: AppState) -> Router {
    let static_files = static_routes(&app_state.config);

    Router::new()
        .merge(health_routes(app_state.clone()))
        .merge(sse_routes(app_state.clone()))
        .merge(broadcast_routes(app_state))
        .fallback_service(static_files)
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_controller::health_check))
        .with_state(app_state)
}

fn sse_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/subscribe", get(handler::subscribe))
        .route("/events", get(handler::events))
        .with_state(app_state)
}

fn broadcast_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/broadcast", post(broadcast_controller::trigger))
        .with_state(app_state)
}

/// Every path without a route is looked up in the static directory.
pub fn static_routes(config: &Config) -> ServeDir {
    ServeDir::new(config.static_dir())
}
