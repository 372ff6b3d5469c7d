// Integration tests for the HTTP control surface
//
// These tests drive the full router in-process with tower's oneshot and
// verify the status codes and payloads the browser widget depends on:
// 409 for a double start, 503 for a refused device, a benign 200 for a
// stray stop, and 410 for a playback URL a newer take invalidated.

mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use common::ScriptedDevice;
use micrec::{create_router, AppState, RecordingSession};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> (Router, ScriptedDevice) {
    let device = ScriptedDevice::new();
    let session = Arc::new(RecordingSession::new(Box::new(device.clone())));
    (create_router(AppState::new(session)), device)
}

async fn send(app: &Router, method: Method, uri: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    app.clone().oneshot(request).await.expect("router should respond")
}

async fn read_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should collect")
        .to_vec()
}

async fn read_json(response: Response) -> Value {
    serde_json::from_slice(&read_body(response).await).expect("body should be JSON")
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let (app, _device) = test_app();

    let response = send(&app, Method::GET, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_record_and_fetch_lifecycle() -> Result<()> {
    let (app, device) = test_app();

    // Start a take
    let response = send(&app, Method::POST, "/recorder/start").await;
    assert_eq!(response.status(), StatusCode::OK);
    let started = read_json(response).await;
    assert_eq!(started["status"], "recording");
    let recording_id = started["recording_id"].as_str().expect("id").to_string();

    // Status shows the live take, with the downstream slots still empty
    let status = read_json(send(&app, Method::GET, "/recorder/status").await).await;
    assert_eq!(status["phase"], "recording");
    assert_eq!(status["is_recording"], true);
    assert!(status["recording"].is_null(), "No playback ref while recording");
    assert!(status["transcription"].is_null());
    assert!(status["response"].is_null());

    // Feed audio, then stop
    let tap = device.tap(0);
    tap.push(&[10, 20, 30]).await;
    tap.push(&[40]).await;
    let response = send(&app, Method::POST, "/recorder/stop").await;
    assert_eq!(response.status(), StatusCode::OK);
    let stopped = read_json(response).await;
    assert_eq!(stopped["status"], "stopped");
    assert_eq!(stopped["session"]["phase"], "stopped");
    assert_eq!(stopped["session"]["chunks_received"], 2);
    let url = stopped["session"]["recording"]["url"]
        .as_str()
        .expect("playback url")
        .to_string();
    assert_eq!(url, format!("/recorder/recording/{}", recording_id));

    // The playback URL serves the raw PCM with its media type
    let response = send(&app, Method::GET, &url).await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    assert_eq!(content_type.as_deref(), Some("audio/L16;rate=16000;channels=1"));
    assert_eq!(read_body(response).await, vec![10, 20, 30, 40]);
    Ok(())
}

#[tokio::test]
async fn test_start_while_recording_conflicts() -> Result<()> {
    let (app, _device) = test_app();
    send(&app, Method::POST, "/recorder/start").await;

    let response = send(&app, Method::POST, "/recorder/start").await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Already recording");
    Ok(())
}

#[tokio::test]
async fn test_refused_device_maps_to_unavailable() -> Result<()> {
    let (app, device) = test_app();
    device.deny_next("Microphone permission denied");

    let response = send(&app, Method::POST, "/recorder/start").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = read_json(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error text")
        .contains("Microphone permission denied"));

    // The refusal is also visible in status
    let status = read_json(send(&app, Method::GET, "/recorder/status").await).await;
    assert_eq!(status["phase"], "idle");
    assert!(status["last_error"]
        .as_str()
        .expect("last_error")
        .contains("Microphone permission denied"));
    Ok(())
}

#[tokio::test]
async fn test_stop_when_idle_is_benign() -> Result<()> {
    let (app, _device) = test_app();

    let response = send(&app, Method::POST, "/recorder/stop").await;

    assert_eq!(response.status(), StatusCode::OK, "A stray stop is not an error");
    let body = read_json(response).await;
    assert_eq!(body["status"], "no-op");
    assert_eq!(body["session"]["phase"], "idle");
    Ok(())
}

#[tokio::test]
async fn test_new_take_invalidates_old_playback_url() -> Result<()> {
    let (app, device) = test_app();

    // First take
    send(&app, Method::POST, "/recorder/start").await;
    device.tap(0).push(&[1, 1]).await;
    let stopped = read_json(send(&app, Method::POST, "/recorder/stop").await).await;
    let first_url = stopped["session"]["recording"]["url"]
        .as_str()
        .expect("first url")
        .to_string();
    assert_eq!(send(&app, Method::GET, &first_url).await.status(), StatusCode::OK);

    // Starting again clears the artifact, so the old URL dangles
    send(&app, Method::POST, "/recorder/start").await;
    assert_eq!(
        send(&app, Method::GET, &first_url).await.status(),
        StatusCode::NOT_FOUND,
        "No artifact exists while the new take records"
    );

    // After the new take finishes, the old URL is gone for good
    device.tap(1).push(&[2, 2]).await;
    let stopped = read_json(send(&app, Method::POST, "/recorder/stop").await).await;
    let second_url = stopped["session"]["recording"]["url"]
        .as_str()
        .expect("second url")
        .to_string();

    assert_eq!(send(&app, Method::GET, &first_url).await.status(), StatusCode::GONE);
    let response = send(&app, Method::GET, &second_url).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_body(response).await, vec![2, 2]);
    Ok(())
}

#[tokio::test]
async fn test_unknown_recording_is_not_found() -> Result<()> {
    let (app, _device) = test_app();

    let uri = format!("/recorder/recording/{}", uuid::Uuid::new_v4());
    let response = send(&app, Method::GET, &uri).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_malformed_recording_id_is_rejected() -> Result<()> {
    let (app, _device) = test_app();

    let response = send(&app, Method::GET, "/recorder/recording/not-a-uuid").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
