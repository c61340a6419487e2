//! HTTP route tests against the simulated camera

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use api::config::AuthConfig;
use api::rate_limit::RateLimitConfig;
use api::{create_router, AppState, Settings};
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use camera_capture::{CameraConfig, CaptureMode, SimulatedCamera, StreamSize};
use futures_util::StreamExt;
use mode_arbiter::{ArbiterConfig, ModeArbiter, RecordingConfig, RecordingController};
use motion::MotionStatus;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

struct Harness {
    camera: Arc<SimulatedCamera>,
    arbiter: Arc<ModeArbiter>,
    state: Arc<AppState>,
    app: Router,
    _recordings: tempfile::TempDir,
}

fn harness(rate_limit: RateLimitConfig) -> Harness {
    let camera_config = CameraConfig {
        main: StreamSize::new(320, 240),
        ..Default::default()
    };
    let camera = Arc::new(SimulatedCamera::new(camera_config));
    let arbiter = Arc::new(ModeArbiter::start(camera.clone(), ArbiterConfig::default()).unwrap());

    let recordings = tempfile::tempdir().unwrap();
    let recorder = Arc::new(RecordingController::new(
        arbiter.clone(),
        &RecordingConfig {
            output_dir: Some(recordings.path().to_path_buf()),
        },
    ));

    let mut settings = Settings::default();
    settings.auth = AuthConfig::new("admin", "secret");
    settings.stream.width = 160;
    settings.stream.height = 120;

    let state = Arc::new(AppState::new(
        arbiter.clone(),
        recorder,
        MotionStatus::default(),
        &settings,
    ));

    Harness {
        camera,
        arbiter,
        app: create_router(state.clone(), &rate_limit),
        state,
        _recordings: recordings,
    }
}

fn no_rate_limit() -> RateLimitConfig {
    RateLimitConfig {
        enabled: false,
        ..Default::default()
    }
}

fn request(method: &str, uri: &str, credentials: Option<(&str, &str)>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user, pass)) = credentials {
        let token = STANDARD.encode(format!("{}:{}", user, pass));
        builder = builder.header(header::AUTHORIZATION, format!("Basic {}", token));
    }
    let mut request = builder.body(Body::empty()).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
    request
}

const VALID: Option<(&str, &str)> = Some(("admin", "secret"));

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_protected_routes_require_credentials() {
    let h = harness(no_rate_limit());

    for (method, uri) in [
        ("GET", "/"),
        ("GET", "/record"),
        ("POST", "/toggle_record"),
        ("GET", "/record_status"),
    ] {
        let response = h.app.clone().oneshot(request(method, uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"Login Required\""
        );
        assert_eq!(body_text(response).await, "Authentication required");
    }

    // Rejected requests never touch the camera
    assert_eq!(h.arbiter.state().unwrap().active_viewers, 0);
    assert_eq!(h.camera.configure_count(CaptureMode::FullRes), 0);
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let h = harness(no_rate_limit());
    let response = h
        .app
        .oneshot(request("GET", "/record_status", Some(("admin", "nope"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_motion_alerts_is_public() {
    let h = harness(no_rate_limit());
    let response = h.app.oneshot(request("GET", "/motion_alerts", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "text/plain");
    assert_eq!(body_text(response).await, "nomotion");
}

#[tokio::test]
async fn test_record_page_served() {
    let h = harness(no_rate_limit());
    let response = h.app.oneshot(request("GET", "/record", VALID)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("/toggle_record"));
    assert!(page.contains("/record_status"));
}

#[tokio::test]
async fn test_toggle_record_cycle() {
    let h = harness(no_rate_limit());

    let status = h.app.clone().oneshot(request("GET", "/record_status", VALID)).await.unwrap();
    assert_eq!(body_text(status).await, "not_recording");

    let started = h.app.clone().oneshot(request("POST", "/toggle_record", VALID)).await.unwrap();
    assert_eq!(started.status(), StatusCode::OK);
    assert_eq!(body_text(started).await, "Recording started");
    assert_eq!(h.arbiter.state().unwrap().mode, CaptureMode::FullRes);

    let status = h.app.clone().oneshot(request("GET", "/record_status", VALID)).await.unwrap();
    assert_eq!(body_text(status).await, "recording");

    let stopped = h.app.clone().oneshot(request("POST", "/toggle_record", VALID)).await.unwrap();
    let message = body_text(stopped).await;
    assert!(message.starts_with("Recording stopped, saved as "), "{}", message);
    assert!(message.ends_with(".h264"));
    assert_eq!(h.arbiter.state().unwrap().mode, CaptureMode::LowRes);
}

#[tokio::test]
async fn test_toggle_failure_reports_error() {
    let h = harness(no_rate_limit());
    h.camera.fail_next_start_recording();

    let response = h.app.oneshot(request("POST", "/toggle_record", VALID)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!h.arbiter.state().unwrap().recording);
}

#[tokio::test]
async fn test_toggle_rate_limited() {
    let h = harness(RateLimitConfig {
        enabled: true,
        per_second: 60,
        burst_size: 1,
    });

    let first = h.app.clone().oneshot(request("POST", "/toggle_record", VALID)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = h.app.clone().oneshot(request("POST", "/toggle_record", VALID)).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    // The throttled request did not stop the recording
    assert!(h.arbiter.state().unwrap().recording);
}

#[tokio::test]
async fn test_health_reports_arbiter_state() {
    let h = harness(no_rate_limit());
    let response = h.app.oneshot(request("GET", "/api/v1/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["mode"], "low_res");
    assert_eq!(health["active_viewers"], 0);
    assert_eq!(health["recording"], false);
    assert_eq!(health["display_on"], true);
}

#[tokio::test]
async fn test_metrics_without_recorder() {
    let h = harness(no_rate_limit());
    let response = h.app.oneshot(request("GET", "/metrics", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_stream_holds_viewer_until_disconnect() {
    let h = harness(no_rate_limit());

    let response = h.app.clone().oneshot(request("GET", "/", VALID)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "multipart/x-mixed-replace; boundary=frame"
    );

    let state = h.arbiter.state().unwrap();
    assert_eq!(state.active_viewers, 1);
    assert_eq!(state.mode, CaptureMode::FullRes);

    let mut parts = response.into_body().into_data_stream();
    let first = parts.next().await.unwrap().unwrap();
    assert!(first.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8"));

    drop(parts);
    let mut released = false;
    for _ in 0..200 {
        if h.arbiter.state().unwrap().active_viewers == 0 {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(released, "viewer was never released");
    assert_eq!(h.arbiter.state().unwrap().mode, CaptureMode::LowRes);
    assert_eq!(h.camera.configure_count(CaptureMode::FullRes), 1);
}

async fn wait_for_release(arbiter: &ModeArbiter) -> bool {
    for _ in 0..200 {
        if arbiter.state().unwrap().active_viewers == 0 {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_graceful_shutdown_with_live_stream() {
    let h = harness(no_rate_limit());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let app = h.app.clone();
    let state = h.state.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
                state.begin_shutdown();
            })
            .await
    });

    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    let token = STANDARD.encode("admin:secret");
    let request = format!(
        "GET / HTTP/1.1\r\nHost: localhost\r\nAuthorization: Basic {}\r\n\r\n",
        token
    );
    client.write_all(request.as_bytes()).await.unwrap();

    let mut head = vec![0u8; 4096];
    let n = client.read(&mut head).await.unwrap();
    assert!(String::from_utf8_lossy(&head[..n]).starts_with("HTTP/1.1 200"));
    assert_eq!(h.arbiter.state().unwrap().active_viewers, 1);

    // Keep the viewer connected and draining while the server stops
    let reader = tokio::spawn(async move {
        let mut rest = Vec::new();
        let _ = client.read_to_end(&mut rest).await;
    });

    stop_tx.send(()).unwrap();
    let served = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop while a viewer was connected");
    served.unwrap().unwrap();

    assert!(wait_for_release(&h.arbiter).await, "viewer was never released");
    assert_eq!(h.arbiter.state().unwrap().mode, CaptureMode::LowRes);
    tokio::time::timeout(Duration::from_secs(5), reader)
        .await
        .expect("connection was left open")
        .unwrap();
}

#[tokio::test]
async fn test_stream_ends_when_shutdown_begins() {
    let h = harness(no_rate_limit());

    let response = h.app.clone().oneshot(request("GET", "/", VALID)).await.unwrap();
    let mut parts = response.into_body().into_data_stream();
    assert!(parts.next().await.unwrap().is_ok());

    h.state.begin_shutdown();
    let mut ended = false;
    for _ in 0..10 {
        match tokio::time::timeout(Duration::from_secs(1), parts.next()).await {
            Ok(None) => {
                ended = true;
                break;
            }
            Ok(Some(part)) => assert!(part.is_ok()),
            Err(_) => break,
        }
    }
    assert!(ended, "body kept streaming after shutdown");
    assert!(wait_for_release(&h.arbiter).await, "viewer was never released");
}

#[tokio::test]
async fn test_stream_unavailable_when_switch_fails() {
    let h = harness(no_rate_limit());
    h.camera.fail_next_configure(1);

    let response = h.app.oneshot(request("GET", "/", VALID)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let state = h.arbiter.state().unwrap();
    assert_eq!(state.active_viewers, 0);
    assert_eq!(state.mode, CaptureMode::LowRes);
}
