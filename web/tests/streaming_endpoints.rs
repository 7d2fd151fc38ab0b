use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode, Version};
use axum::Router;
use http_body_util::BodyExt;
use service::config::Config;
use sse::trigger::{self, ChannelTrigger};
use sse::{CancellationToken, Manager, Message};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower::ServiceExt;
use web::router::define_routes;
use web::AppState;

struct TestServer {
    router: Router,
    manager: Arc<Manager>,
    trigger: sse::TriggerHandle,
    source: Option<ChannelTrigger>,
}

impl TestServer {
    fn new() -> Self {
        let config = Config::default().set_static_dir(PathBuf::from(env!("CARGO_MANIFEST_DIR")));
        let manager = Arc::new(Manager::new(Message::new(config.broadcast_message())));
        let (trigger, source) = trigger::channel(1);
        let router = define_routes(AppState::new(config, Arc::clone(&manager), trigger.clone()));

        Self {
            router,
            manager,
            trigger,
            source: Some(source),
        }
    }

    fn start_broadcast_loop(&mut self, shutdown: CancellationToken) {
        let source = self.source.take().expect("broadcast loop already started");
        Arc::clone(&self.manager).spawn(source, shutdown);
    }

    async fn get(&self, uri: &str, version: Version) -> axum::response::Response {
        let request = Request::builder()
            .uri(uri)
            .version(version)
            .body(Body::empty())
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }
}

async fn wait_for_subscribers(manager: &Manager, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while manager.registry().len().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("registry never reached the expected size");
}

#[tokio::test]
async fn subscribe_receives_one_message_per_trigger_and_is_pruned_after_disconnect() {
    let mut server = TestServer::new();
    let shutdown = CancellationToken::new();
    server.start_broadcast_loop(shutdown.clone());
    let before = server.manager.registry().len().await;

    let response = server.get("/subscribe", Version::HTTP_11).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers[header::TRANSFER_ENCODING], "chunked");
    assert_eq!(server.manager.registry().len().await, before + 1);

    let mut body = response.into_body();
    server.trigger.fire().unwrap();
    let frame = body.frame().await.unwrap().unwrap().into_data().unwrap();
    assert_eq!(&frame[..], b"data: hello :)\n\n");

    // Exactly one message per trigger
    let next = tokio::time::timeout(Duration::from_millis(200), body.frame()).await;
    assert!(next.is_err(), "no message should arrive without a trigger");

    // Client goes away; the next pass prunes it
    drop(body);
    server.trigger.fire().unwrap();
    wait_for_subscribers(&server.manager, before).await;

    shutdown.cancel();
}

#[tokio::test]
async fn broadcast_reaches_every_subscriber() {
    let mut server = TestServer::new();
    server.start_broadcast_loop(CancellationToken::new());

    let mut bodies = Vec::new();
    for _ in 0..3 {
        let response = server.get("/subscribe", Version::HTTP_11).await;
        bodies.push(response.into_body());
    }

    let response = server
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/broadcast")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    for body in bodies.iter_mut() {
        let frame = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(&frame[..], b"data: hello :)\n\n");
    }
}

#[tokio::test]
async fn subscribe_over_http_1_0_is_rejected_without_registering() {
    let server = TestServer::new();

    let response = server.get("/subscribe", Version::HTTP_10).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(server.manager.registry().is_empty().await);
}

#[tokio::test]
async fn subscribe_over_http_2_cannot_be_taken_over() {
    let server = TestServer::new();

    let response = server.get("/subscribe", Version::HTTP_2).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(server.manager.registry().is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn events_stream_delivers_interleaved_batches_until_timeout() {
    let server = TestServer::new();
    let started = Instant::now();

    let response = server.get("/events", Version::HTTP_11).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers["x-accel-buffering"], "no");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let elapsed = started.elapsed();
    let body = String::from_utf8(body.to_vec()).unwrap();

    // sequence number -> producers that sent it
    let mut batches: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
    for record in body.split("\n\n").filter(|record| !record.is_empty()) {
        let data = record.strip_prefix("data: ").expect("event-stream data field");
        let value: serde_json::Value = serde_json::from_str(data).unwrap();
        batches
            .entry(value["sequence"].as_u64().unwrap())
            .or_default()
            .push(value["producer"].as_u64().unwrap());
    }

    assert!((4..=5).contains(&batches.len()), "got {} batches", batches.len());
    for producers in batches.values_mut() {
        producers.sort_unstable();
        assert_eq!(producers, &vec![1, 2, 3, 4]);
    }
    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed < Duration::from_secs(12));
}

#[tokio::test(start_paused = true)]
async fn events_over_http_1_0_end_without_messages() {
    let server = TestServer::new();

    let response = server.get("/events", Version::HTTP_10).await;
    let body = response.into_body().collect().await.unwrap().to_bytes();

    assert!(body.is_empty());
}

#[tokio::test]
async fn broadcast_endpoint_reports_a_stopped_loop() {
    let mut server = TestServer::new();
    drop(server.source.take());

    let response = server
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/broadcast")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health_reports_subscriber_count() {
    let server = TestServer::new();
    let _subscriber = server.get("/subscribe", Version::HTTP_11).await;

    let response = server.get("/health", Version::HTTP_11).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["status_code"], 200);
    assert_eq!(value["data"]["status"], "healthy");
    assert_eq!(value["data"]["subscribers"], 1);
    assert_eq!(value["data"]["broadcast_loop"], "Idle");
}

#[tokio::test]
async fn unknown_paths_fall_back_to_static_files() {
    let server = TestServer::new();

    let found = server.get("/Cargo.toml", Version::HTTP_11).await;
    assert_eq!(found.status(), StatusCode::OK);

    let missing = server.get("/no-such-file.html", Version::HTTP_11).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
