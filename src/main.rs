use log::*;
use service::{config::Config, logging::Logger};
use sse::{trigger, CancellationToken, Manager, Message};
use std::sync::Arc;
use web::AppState;

/// Manual triggers queued while a broadcast pass is running.
const PENDING_TRIGGERS: usize = 8;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
    }

    info!("Starting up in {} mode", config.runtime_env());

    let sse_manager = Arc::new(
        Manager::new(Message::new(config.broadcast_message()))
            .with_write_timeout(config.write_timeout()),
    );
    let shutdown = CancellationToken::new();

    let (broadcast_trigger, manual_triggers) = trigger::channel(PENDING_TRIGGERS);
    let broadcast_loop = match signal_trigger() {
        Ok(hangup) => Arc::clone(&sse_manager).spawn(
            trigger::Merged::new(hangup, manual_triggers),
            shutdown.clone(),
        ),
        Err(e) => {
            warn!("SIGHUP broadcasts unavailable: {e}");
            Arc::clone(&sse_manager).spawn(manual_triggers, shutdown.clone())
        }
    };

    info!(
        "Send SIGHUP to pid {} (or POST /broadcast) to broadcast a notification to subscribers",
        std::process::id()
    );

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown requested"),
                Err(e) => error!("Unable to listen for Ctrl-C: {e}"),
            }
            shutdown.cancel();
        }
    });

    let app_state = AppState::new(config, Arc::clone(&sse_manager), broadcast_trigger);
    let mut server = tokio::spawn(web::init_server(app_state, shutdown.clone()));

    // The server only returns on its own when it could not start
    tokio::select! {
        result = &mut server => {
            report_server_exit(result);
            std::process::exit(1);
        }
        _ = shutdown.cancelled() => {}
    }

    if let Err(e) = broadcast_loop.await {
        error!("Broadcast loop failed: {e}");
    }
    // Subscriber streams never end on their own; the server waits for them
    let closed = sse_manager.registry().close_all().await;
    info!("Closed {closed} subscriber connection(s)");

    if !report_server_exit(server.await) {
        std::process::exit(1);
    }
}

fn report_server_exit(result: Result<std::io::Result<()>, tokio::task::JoinError>) -> bool {
    match result {
        Ok(Ok(())) => {
            info!("Server stopped");
            true
        }
        Ok(Err(e)) => {
            error!("Server failed: {e}");
            false
        }
        Err(e) => {
            error!("Server task failed: {e}");
            false
        }
    }
}

#[cfg(unix)]
fn signal_trigger() -> std::io::Result<trigger::SignalTrigger> {
    trigger::SignalTrigger::hangup()
}

#[cfg(not(unix))]
fn signal_trigger() -> std::io::Result<trigger::ChannelTrigger> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "signals are only supported on unix",
    ))
}
