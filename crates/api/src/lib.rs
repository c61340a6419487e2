//! Camera Controller API Server
//!
//! HTTP surface of the camera controller:
//! - `GET /` MJPEG live view (Basic auth)
//! - `GET /record`, `POST /toggle_record`, `GET /record_status` (Basic auth)
//! - `GET /motion_alerts` for the display client
//! - `GET /api/v1/health` and `GET /metrics`

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use camera_capture::{CameraConfig, SharedDevice, SimulatedCamera};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use mode_arbiter::{ModeArbiter, RecordingController, ToggleOutcome};
use motion::{MotionMonitor, MotionStatus};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tower_governor::GovernorLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod auth;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod routes;

pub use crate::config::Settings;
pub use error::ApiError;

use crate::config::{AuthConfig, DeviceBackend, LoggingConfig, StreamConfig};
use crate::rate_limit::{create_governor_config, RateLimitConfig};

/// Application state shared across handlers
pub struct AppState {
    pub arbiter: Arc<ModeArbiter>,
    pub recorder: Arc<RecordingController>,
    pub motion: MotionStatus,
    pub auth: AuthConfig,
    pub stream: StreamConfig,
    /// Prometheus handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: Instant,
    /// Flips to `true` once the server starts draining
    shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(
        arbiter: Arc<ModeArbiter>,
        recorder: Arc<RecordingController>,
        motion: MotionStatus,
        settings: &Settings,
    ) -> Self {
        Self {
            arbiter,
            recorder,
            motion,
            auth: settings.auth.clone(),
            stream: settings.stream.clone(),
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
            shutdown: watch::channel(false).0,
        }
    }

    /// Serve metrics from this Prometheus recorder
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// End every open viewer stream so graceful shutdown can finish
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Receiver that observes [`AppState::begin_shutdown`]
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub mode: String,
    pub active_viewers: usize,
    pub recording: bool,
    pub motion: bool,
    pub display_on: bool,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>, rate_limit: &RateLimitConfig) -> Router {
    let mut toggle = post(routes::recording::toggle_record);
    if rate_limit.enabled {
        match create_governor_config(rate_limit) {
            Some(config) => toggle = toggle.layer(GovernorLayer { config }),
            None => warn!("Invalid rate limit settings, /toggle_record is not limited"),
        }
    }

    let protected = Router::new()
        .route("/", get(routes::stream::video_feed))
        .route("/record", get(routes::recording::record_page))
        .route("/toggle_record", toggle)
        .route("/record_status", get(routes::recording::record_status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_basic_auth,
        ));

    Router::new()
        .merge(protected)
        .route("/motion_alerts", get(routes::motion::motion_alerts))
        .route("/api/v1/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    let arbiter = state.arbiter.state()?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        mode: arbiter.mode.as_str().to_string(),
        active_viewers: arbiter.active_viewers,
        recording: state.recorder.is_recording(),
        motion: state.motion.is_motion_active(),
        display_on: state.motion.is_display_on(),
    }))
}

/// Prometheus exposition handler
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "metrics recorder not installed".to_string(),
        ),
    }
}

/// Initialize logging. `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        subscriber.with(fmt::layer().json()).try_init()
    } else {
        subscriber.with(fmt::layer().with_target(true)).try_init()
    };

    if result.is_err() {
        // A subscriber is already installed
        return;
    }
    info!(
        "Logging initialized: level={}, format={}",
        config.level,
        if config.json { "json" } else { "text" }
    );
}

/// Open the configured capture backend
pub fn open_device(backend: DeviceBackend, camera: &CameraConfig) -> Result<SharedDevice, ApiError> {
    match backend {
        DeviceBackend::Simulated => {
            info!("Using simulated camera");
            Ok(Arc::new(SimulatedCamera::new(camera.clone()).with_frame_pacing(true)))
        }
        #[cfg(feature = "picamera")]
        DeviceBackend::Picamera => {
            let camera = camera_capture::PiCamera::open(camera)
                .map_err(|e| ApiError::Startup(format!("failed to open camera: {}", e)))?;
            Ok(Arc::new(camera))
        }
        #[cfg(not(feature = "picamera"))]
        DeviceBackend::Picamera => Err(ApiError::Startup(
            "built without the picamera feature".to_string(),
        )),
    }
}

/// Run the server until Ctrl-C
pub async fn run_server(settings: Settings) -> Result<(), ApiError> {
    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ApiError::Startup(format!("failed to install metrics recorder: {}", e)))?;

    if settings.auth.credentials().is_none() {
        warn!("No viewer credentials configured (MOTION_USERNAME / MOTION_PASSWORD); all protected routes will reject requests");
    }

    let device = open_device(settings.device.backend, &settings.camera)?;
    let arbiter_config = settings.arbiter.clone();
    let arbiter = Arc::new(
        tokio::task::spawn_blocking(move || ModeArbiter::start(device, arbiter_config)).await??,
    );

    let monitor = MotionMonitor::spawn(
        arbiter.clone(),
        settings.display.build(),
        settings.motion.clone(),
    )?;
    let recorder = Arc::new(RecordingController::new(arbiter.clone(), &settings.recording));

    let state = Arc::new(
        AppState::new(arbiter, recorder.clone(), monitor.status(), &settings).with_metrics(metrics),
    );
    let app = create_router(state.clone(), &settings.rate_limit);

    info!("Starting API server on {}", settings.server.bind_addr);
    let listener = tokio::net::TcpListener::bind(&settings.server.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        // Streaming bodies never finish on their own
        state.begin_shutdown();
    })
    .await?;

    info!("Shutting down");
    tokio::task::spawn_blocking(move || {
        if recorder.is_recording() {
            match recorder.toggle() {
                Ok(ToggleOutcome::Stopped { path }) => info!("Recording finalized: {}", path.display()),
                Ok(outcome) => warn!("Unexpected toggle on shutdown: {}", outcome),
                Err(e) => error!("Failed to stop recording on shutdown: {}", e),
            }
        }
        monitor.stop();
    })
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
