//! Integration tests for the podwave-player HTTP API
//!
//! Exercises the router in-process (no socket) over the in-memory source
//! and resource:
//! - health and build info
//! - playback control endpoints
//! - narration catalogue passthroughs
//! - the SSE stream's initial snapshot

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::StatusCode;
use http::{header, Method, Request};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use helpers::{build_session, done_item, standard_source, wait_for_state, FakeResource, FakeSource};
use podwave_common::ItemId;
use podwave_player::api::{create_router, AppContext};
use podwave_player::audio::AudioResource;
use podwave_player::source::NarrationSource;
use podwave_player::PlaybackSession;

struct TestApp {
    router: axum::Router,
    session: PlaybackSession,
    source: Arc<FakeSource>,
    resource: Arc<FakeResource>,
    background: CancellationToken,
}

fn setup_test_app() -> TestApp {
    let source = standard_source();
    let resource = Arc::new(FakeResource::new());
    let session = build_session(&source, &resource);

    let dyn_source: Arc<dyn NarrationSource> = source.clone();
    let background = CancellationToken::new();
    let router = create_router(AppContext {
        session: session.clone(),
        source: dyn_source,
        background: background.clone(),
    });

    TestApp {
        router,
        session,
        source,
        resource,
        background,
    }
}

/// Send a request and decode the JSON response body (None if empty)
async fn make_request(
    app: &TestApp,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Option<Value>) {
    let mut request = Request::builder().method(method).uri(path);
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(&bytes).ok()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_test_app();

    let (status, body) = make_request(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "podwave-player");
}

#[tokio::test]
async fn test_build_info_endpoint() {
    let app = setup_test_app();

    let (status, body) = make_request(&app, Method::GET, "/build_info", None).await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert!(body["git_hash"].is_string());
    assert!(body["build_timestamp"].is_string());
}

#[tokio::test]
async fn test_initial_state() {
    let app = setup_test_app();

    let (status, body) = make_request(&app, Method::GET, "/playback/state", None).await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["phase"], "idle");
    assert_eq!(body["is_playing"], false);
    assert_eq!(body["current_item_id"], Value::Null);
    assert_eq!(body["playback_rate"], 1.0);
    assert_eq!(body["rate_display"], "1x");
}

#[tokio::test]
async fn test_play_endpoint() {
    let app = setup_test_app();

    let (status, body) =
        make_request(&app, Method::POST, "/playback/play", Some(json!({ "id": 42 }))).await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["current_item_id"], 42);
    assert_eq!(body["current_item"]["title"], "The Future of AI");
    assert_eq!(body["is_playing"], true);
    assert_eq!(body["phase"], "ready_playing");
}

#[tokio::test]
async fn test_play_unknown_item_reports_error_in_state() {
    let app = setup_test_app();

    let (status, body) =
        make_request(&app, Method::POST, "/playback/play", Some(json!({ "id": 99 }))).await;

    // The request itself succeeded; the failure is part of the snapshot
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["phase"], "idle_with_error");
    assert_eq!(body["last_error"]["kind"], "FetchFailed");
    assert_eq!(body["last_error"]["reason"], "NotFound");
}

#[tokio::test]
async fn test_play_rejects_malformed_id() {
    let app = setup_test_app();

    let (status, _) = make_request(
        &app,
        Method::POST,
        "/playback/play",
        Some(json!({ "id": "not-an-id" })),
    )
    .await;

    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_toggle_endpoint() {
    let app = setup_test_app();
    make_request(&app, Method::POST, "/playback/play", Some(json!({ "id": 1 }))).await;

    let (status, body) = make_request(&app, Method::POST, "/playback/toggle", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["phase"], "ready_paused");
    assert!(app.resource.is_paused());
}

#[tokio::test]
async fn test_seek_and_position() {
    let app = setup_test_app();
    make_request(&app, Method::POST, "/playback/play", Some(json!({ "id": 42 }))).await;

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/playback/seek",
        Some(json!({ "position_seconds": 75.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["position_seconds"], 75.0);

    let (status, body) = make_request(&app, Method::GET, "/playback/position", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["position_display"], "1:15");
    assert_eq!(body["remaining_display"], "-8:45");
    assert_eq!(body["duration_seconds"], 600.0);
}

#[tokio::test]
async fn test_rate_endpoints() {
    let app = setup_test_app();

    let (status, body) =
        make_request(&app, Method::POST, "/playback/rate", Some(json!({ "rate": 1.5 }))).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["playback_rate"], 1.5);
    assert_eq!(body["rate_display"], "1.5x");

    let (status, body) = make_request(&app, Method::POST, "/playback/rate/next", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["playback_rate"], 1.75);

    let (status, _) =
        make_request(&app, Method::POST, "/playback/rate", Some(json!({ "rate": 0.0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.session.snapshot().playback_rate, 1.75);
}

#[tokio::test]
async fn test_close_endpoint() {
    let app = setup_test_app();
    make_request(&app, Method::POST, "/playback/play", Some(json!({ "id": 42 }))).await;

    let (status, body) = make_request(&app, Method::POST, "/playback/close", None).await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["phase"], "idle");
    assert_eq!(body["current_item"], Value::Null);
}

#[tokio::test]
async fn test_trending_and_library() {
    let app = setup_test_app();

    let (status, body) = make_request(&app, Method::GET, "/narrations/trending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap().as_array().unwrap().len(), 3);

    let (status, body) = make_request(&app, Method::GET, "/narrations?search=mindful", None).await;
    assert_eq!(status, StatusCode::OK);
    let items = body.unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Mindfulness Hacks");
}

#[tokio::test]
async fn test_listing_failure_yields_empty_list() {
    let app = setup_test_app();
    app.source.set_fail_listings(true);

    let (status, body) = make_request(&app, Method::GET, "/narrations/trending", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap(), json!([]));
}

#[tokio::test]
async fn test_get_narration() {
    let app = setup_test_app();

    let (status, body) = make_request(&app, Method::GET, "/narrations/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["title"], "Mindfulness Hacks");

    let (status, _) = make_request(&app, Method::GET, "/narrations/99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = make_request(&app, Method::GET, "/narrations/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_narration_from_text() {
    let app = setup_test_app();

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/narrations",
        Some(json!({ "text": "A short essay on remote work." })),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let body = body.unwrap();
    assert_eq!(body["task_id"], "task-1");
    assert_eq!(body["item_id"], 100);
    assert_eq!(app.source.submissions(), vec!["A short essay on remote work.".to_string()]);
}

#[tokio::test]
async fn test_create_narration_validation() {
    let app = setup_test_app();

    for body in [
        json!({}),
        json!({ "text": "words", "url": "https://blog.example/post" }),
        json!({ "text": "   " }),
        json!({ "url": "ftp://blog.example/post" }),
    ] {
        let (status, _) = make_request(&app, Method::POST, "/narrations", Some(body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {}", body);
    }
    assert!(app.source.submissions().is_empty());
}

#[tokio::test]
async fn test_create_and_play_when_ready() {
    let app = setup_test_app();
    app.source.insert(done_item(100, "Fresh Narration"));

    let (status, _) = make_request(
        &app,
        Method::POST,
        "/narrations",
        Some(json!({ "url": "https://blog.example/post", "play_when_ready": true })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    wait_for_state(&app.session, |state| {
        state.current_item_id == Some(ItemId::Numeric(100)) && state.is_playing
    })
    .await;
}

#[tokio::test]
async fn test_play_when_ready_stops_at_shutdown() {
    let app = setup_test_app();
    app.source.insert(done_item(100, "Fresh Narration"));
    app.background.cancel();

    let (status, _) = make_request(
        &app,
        Method::POST,
        "/narrations",
        Some(json!({ "url": "https://blog.example/post", "play_when_ready": true })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(app.source.fetch_count(100), 0);
    let state = app.session.snapshot();
    assert!(state.current_item_id.is_none());
    assert!(!state.is_loading);
    assert_eq!(app.resource.creation_count(), 0);
}

#[tokio::test]
async fn test_task_status() {
    let app = setup_test_app();

    let (status, body) = make_request(&app, Method::GET, "/tasks/task-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["status"], "started");

    let (status, _) = make_request(&app, Method::GET, "/tasks/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_current_narration_closes_session() {
    let app = setup_test_app();
    make_request(&app, Method::POST, "/playback/play", Some(json!({ "id": 42 }))).await;

    let (status, body) = make_request(&app, Method::DELETE, "/narrations/42", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["status"], "ok");

    let state = app.session.snapshot();
    assert!(state.current_item_id.is_none());
    assert!(app.resource.is_paused());

    let (status, _) = make_request(&app, Method::DELETE, "/narrations/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_other_narration_keeps_playing() {
    let app = setup_test_app();
    make_request(&app, Method::POST, "/playback/play", Some(json!({ "id": 42 }))).await;

    let (status, _) = make_request(&app, Method::DELETE, "/narrations/1", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.session.snapshot().current_item_id, Some(ItemId::Numeric(42)));
}

#[tokio::test]
async fn test_event_stream_starts_with_snapshot() {
    let app = setup_test_app();
    app.session.set_playback_rate(1.25).await.unwrap();

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "text/event-stream"
    );

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("no SSE frame")
        .expect("stream ended")
        .unwrap();
    let data = frame.into_data().unwrap();
    let text = String::from_utf8(data.to_vec()).unwrap();

    assert!(text.contains("event: PlaybackState"), "got {}", text);
    assert!(text.contains("\"playback_rate\":1.25"), "got {}", text);
}
