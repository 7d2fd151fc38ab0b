use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use log::*;

/// POST /broadcast
///
/// Same effect as sending SIGHUP to the process: queues one broadcast pass.
pub(crate) async fn trigger(State(app_state): State<AppState>) -> impl IntoResponse {
    match app_state.broadcast_trigger.fire() {
        Ok(()) => {
            debug!("Broadcast requested through the admin endpoint");
            (StatusCode::ACCEPTED, "broadcast queued")
        }
        Err(e) => {
            warn!("Dropping broadcast request: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, "broadcast loop stopped")
        }
    }
}
