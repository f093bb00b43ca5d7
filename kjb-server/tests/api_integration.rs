//! Integration tests for the HTTP API
//!
//! Tests cover:
//! - Health and status endpoints
//! - Propose/vote round trips and their error mapping
//! - Library listing, search and refresh
//! - SSE push channel starting with the current state
//! - Graceful shutdown with an SSE client still connected

mod helpers;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use helpers::Jukebox;
use http_body_util::BodyExt;
use kjb_server::player::PlayerGateway;
use kjb_server::{create_router, AppContext, Phase};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt; // for `oneshot` method

fn setup_app(jukebox: &Jukebox) -> Router {
    setup_app_with_shutdown(jukebox, CancellationToken::new())
}

fn setup_app_with_shutdown(jukebox: &Jukebox, shutdown: CancellationToken) -> Router {
    let (_, phase) = watch::channel(Phase::Idle);
    let gateway: Arc<dyn PlayerGateway> = jukebox.player.clone();
    let ctx = AppContext {
        store: jukebox.store.clone(),
        library: jukebox.library.clone(),
        votes: jukebox.votes.clone(),
        gateway,
        phase,
        library_directory: "/media/music".to_string(),
        shutdown,
    };
    create_router(ctx, None)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

#[tokio::test]
async fn test_health_endpoint() {
    let jukebox = Jukebox::with_library(&[]).await;
    let app = setup_app(&jukebox);

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "kjb-server");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_propose_then_state() {
    let jukebox = Jukebox::with_library(&["a.mp3"]).await;
    let app = setup_app(&jukebox);

    let (status, body) = send(
        &app,
        post_json(
            "/api/propose",
            json!({"label": "Song A", "file": "a.mp3", "userId": "u1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (status, state) = send(&app, get("/api/state")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["queue"][0]["file"], "a.mp3");
    assert_eq!(state["queue"][0]["votes"], 1);
    assert_eq!(state["voters"]["u1"], "a.mp3");
    assert_eq!(state["nowPlaying"], Value::Null);
}

#[tokio::test]
async fn test_duplicate_proposal_is_conflict() {
    let jukebox = Jukebox::with_library(&["a.mp3"]).await;
    let app = setup_app(&jukebox);
    let first = json!({"label": "Song A", "file": "a.mp3", "userId": "u1"});
    let second = json!({"label": "Song A", "file": "a.mp3", "userId": "u2"});

    send(&app, post_json("/api/propose", first)).await;
    let (status, body) = send(&app, post_json("/api/propose", second)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "conflict");
    assert_eq!(body["error"]["code"], "DUPLICATE_QUEUE_ENTRY");
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn test_vote_errors() {
    let jukebox = Jukebox::with_library(&["a.mp3", "b.mp3"]).await;
    let app = setup_app(&jukebox);
    send(
        &app,
        post_json(
            "/api/propose",
            json!({"label": "A", "file": "a.mp3", "userId": "u1"}),
        ),
    )
    .await;

    let (status, body) = send(
        &app,
        post_json("/api/vote", json!({"file": "a.mp3", "userId": "u1"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_ACTED");

    let (status, body) = send(
        &app,
        post_json("/api/vote", json!({"file": "b.mp3", "userId": "u2"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, body) = send(&app, post_json("/api/vote", json!({"file": "a.mp3"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_input");

    let (status, _) = send(
        &app,
        post_json("/api/vote", json!({"file": "a.mp3", "userId": "u2"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(jukebox.store.snapshot().await.queue[0].votes, 2);
}

#[tokio::test]
async fn test_unknown_item_is_not_found() {
    let jukebox = Jukebox::with_library(&["a.mp3"]).await;
    let app = setup_app(&jukebox);

    let (status, body) = send(
        &app,
        post_json(
            "/api/propose",
            json!({"label": "X", "file": "x.mp3", "userId": "u1"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "UNKNOWN_ITEM");
}

#[tokio::test]
async fn test_malformed_body_is_invalid_input() {
    let jukebox = Jukebox::with_library(&["a.mp3"]).await;
    let app = setup_app(&jukebox);

    let request = Request::builder()
        .method("POST")
        .uri("/api/propose")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_input");
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_library_listing_and_search() {
    let jukebox = Jukebox::with_library(&["Alpha.mp3", "beta.mp3", "alphabet.ogg"]).await;
    let app = setup_app(&jukebox);

    let (status, body) = send(&app, get("/api/library")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"].as_array().unwrap().len(), 3);

    let (_, body) = send(&app, get("/api/library?q=alpha")).await;
    let files: Vec<&str> = body["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["file"].as_str().unwrap())
        .collect();
    assert_eq!(files, vec!["Alpha.mp3", "alphabet.ogg"]);
}

#[tokio::test]
async fn test_library_refresh() {
    let jukebox = Jukebox::with_library(&["a.mp3"]).await;
    jukebox
        .player
        .set_listing(&["/m/One.mp3", "/m/Two.flac", "/m/cover.jpg"]);
    let app = setup_app(&jukebox);

    let (status, body) = send(&app, post_json("/api/library/refresh", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"], 2);
    assert!(jukebox.library.lookup("/m/Two.flac"));

    jukebox.player.break_listing();
    let (status, body) = send(&app, post_json("/api/library/refresh", json!({}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["kind"], "upstream_unavailable");
    // The previous catalog stays in place
    assert_eq!(jukebox.library.len(), 2);
}

#[tokio::test]
async fn test_status_endpoint() {
    let jukebox = Jukebox::with_library(&["a.mp3", "b.mp3"]).await;
    jukebox.queue("a.mp3", 2).await;
    let app = setup_app(&jukebox);

    let (status, body) = send(&app, get("/api/status")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "idle");
    assert_eq!(body["library_size"], 2);
    assert_eq!(body["queue_length"], 1);
    assert_eq!(body["revision"], 2);
    assert_eq!(body["now_playing"], Value::Null);
}

#[tokio::test]
async fn test_events_stream_starts_with_initial_state() {
    let jukebox = Jukebox::with_library(&["a.mp3"]).await;
    jukebox.queue("a.mp3", 1).await;
    let app = setup_app(&jukebox);

    let response = app.oneshot(get("/api/events")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .expect("no SSE frame within timeout")
        .expect("stream ended")
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();

    assert!(text.contains("event: initial"));
    assert!(text.contains("id: 1"));
    let data = text
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .unwrap();
    let message: Value = serde_json::from_str(data).unwrap();
    assert_eq!(message["type"], "initial");
    assert_eq!(message["state"]["queue"][0]["file"], "a.mp3");
    assert!(message["emittedAt"].is_string());
}

#[tokio::test]
async fn test_graceful_shutdown_closes_sse_streams() {
    let jukebox = Jukebox::with_library(&["a.mp3"]).await;
    let shutdown = CancellationToken::new();
    let app = setup_app_with_shutdown(&jukebox, shutdown.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let signal = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
    });

    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET /api/events HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
        .await
        .unwrap();

    let mut buf = vec![0u8; 4096];
    let read = tokio::time::timeout(Duration::from_secs(5), client.read(&mut buf))
        .await
        .expect("no SSE response within timeout")
        .unwrap();
    let head = String::from_utf8_lossy(&buf[..read]).to_string();
    assert!(head.contains("200 OK"));
    assert_eq!(jukebox.store.observer_count(), 1);

    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not finish shutting down with an SSE client connected")
        .unwrap()
        .unwrap();
    assert!(jukebox.store.flush().await.is_ok());
}
