use ::sse::{EventStream, Manager, TriggerHandle};
use log::*;
use service::config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

mod controller;
pub mod error;
pub mod router;
mod sse;

// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sse_manager: Arc<Manager>,
    pub broadcast_trigger: TriggerHandle,
}

impl AppState {
    pub fn new(config: Config, sse_manager: Arc<Manager>, broadcast_trigger: TriggerHandle) -> Self {
        Self {
            config,
            sse_manager,
            broadcast_trigger,
        }
    }

    /// Settings for a new `/events` stream, taken from the current config.
    pub fn event_stream(&self) -> EventStream {
        EventStream::new(
            self.config.events_producers(),
            self.config.events_interval(),
            self.config.events_timeout(),
        )
        .with_write_timeout(self.config.write_timeout())
    }
}

/// Serves the router on the configured address until `shutdown` fires.
pub async fn init_server(app_state: AppState, shutdown: CancellationToken) -> std::io::Result<()> {
    let listen_addr = app_state.config.listen_addr();
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Server starting... listening for connections on http://{listen_addr}");

    let router = router::define_routes(app_state);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
