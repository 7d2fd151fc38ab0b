use crate::error::Result;
use crate::AppState;
use ::sse::Error as SseError;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE, TRANSFER_ENCODING,
};
use axum::http::{HeaderName, Version};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use log::*;
use tokio::io::DuplexStream;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

/// Bytes a client may lag behind before writes to it start to block.
const STREAM_BUFFER_BYTES: usize = 64 * 1024;

const EVENT_STREAM: &str = "text/event-stream";
const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// What a request's transport lets a handler do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TransportCapabilities {
    /// Partial responses can be pushed to the client as they are produced.
    pub flush: bool,
    /// The response stream can be owned exclusively by another task.
    pub hijack: bool,
}

impl TransportCapabilities {
    pub(crate) fn of(version: Version) -> Self {
        match version {
            // No chunked transfer coding before HTTP/1.1
            Version::HTTP_09 | Version::HTTP_10 => Self {
                flush: false,
                hijack: true,
            },
            Version::HTTP_11 => Self {
                flush: true,
                hijack: true,
            },
            // Multiplexed streams share one connection
            _ => Self {
                flush: true,
                hijack: false,
            },
        }
    }
}

/// A response body fed by the returned write half.
fn response_pipe() -> (DuplexStream, ReaderStream<DuplexStream>) {
    let (writer, reader) = tokio::io::duplex(STREAM_BUFFER_BYTES);
    (writer, ReaderStream::new(reader))
}

/// GET /subscribe
///
/// Takes over the response stream and registers it for broadcasts. The
/// response never ends on its own: only a failed write during a broadcast
/// pass, or process exit, closes it.
pub(crate) async fn subscribe(
    State(app_state): State<AppState>,
    version: Version,
) -> Result<Response> {
    let capabilities = TransportCapabilities::of(version);
    if !capabilities.flush {
        return Err(SseError::streaming_unsupported().into());
    }
    if !capabilities.hijack {
        return Err(SseError::hijack_unsupported().into());
    }

    let (transport, body) = response_pipe();
    let connection_id = app_state.sse_manager.subscribe(Box::new(transport)).await;
    debug!("Subscriber {connection_id} handed over to the broadcast registry");

    Ok((
        [
            (CONTENT_TYPE, EVENT_STREAM),
            (TRANSFER_ENCODING, "chunked"),
            (CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

/// GET /events
///
/// Streams messages from a per-request producer pool until the configured
/// timeout elapses or the client goes away.
pub(crate) async fn events(State(app_state): State<AppState>, version: Version) -> Response {
    let capabilities = TransportCapabilities::of(version);
    let stream = app_state.event_stream();
    let (transport, body) = response_pipe();

    // Cancelled as soon as the server drops the response body
    let connection = CancellationToken::new();
    let guard = connection.clone().drop_guard();

    debug!(
        "Starting event stream: {} producer(s) every {:?} for {:?}",
        stream.pool().producers(),
        stream.pool().interval(),
        stream.timeout()
    );
    tokio::spawn(async move {
        let report = stream.run(transport, capabilities.flush, connection).await;
        info!(
            "Event stream ended ({:?}) after {:?}: delivered {} of {} message(s)",
            report.reason,
            report.elapsed,
            report.delivered,
            report.pool.total_sent()
        );
    });

    let body = body.map(move |chunk| {
        let _connection = &guard;
        chunk
    });

    (
        [
            (CONTENT_TYPE, EVENT_STREAM),
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}
