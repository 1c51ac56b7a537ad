//! # vigil-server
//!
//! The externally reachable control surface. Every operation maps 1:1 onto
//! an action variant and is routed through the governed executor with
//! `source = api`, exactly like an autonomous step — the HTTP layer is a
//! thin shell with input validation and structured outcome bodies.

pub mod metrics;

use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderMap, Request, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use vigil_agent::AutonomyController;
use vigil_config::ServerConfig;
use vigil_core::{
    Action, ActionOutcome, ActionSource, ActivityLog, ControlEvent, TaskSpec, VigilError,
};
use vigil_desktop::{ActionExecutor, ActionOutput};
use vigil_safety::SafetyGovernor;

/// The core objects the server fronts. Constructed once at startup and
/// passed in explicitly — no globals.
#[derive(Clone)]
pub struct ServerContext {
    pub executor: Arc<ActionExecutor>,
    pub autonomy: Arc<AutonomyController>,
    pub governor: Arc<SafetyGovernor>,
    pub log: Arc<ActivityLog>,
    /// Step budget used when `start-autonomy` does not supply one.
    pub default_step_budget: u32,
}

/// Shared server state.
pub struct AppState {
    config: ServerConfig,
    ctx: ServerContext,
    metrics: metrics::Metrics,
}

// ── Request bodies ─────────────────────────────────────────────

#[derive(Deserialize)]
struct MoveRequest {
    x: i32,
    y: i32,
}

#[derive(Deserialize)]
struct ClickRequest {
    #[serde(default = "default_button")]
    button: u8,
    #[serde(default)]
    x: Option<i32>,
    #[serde(default)]
    y: Option<i32>,
}

fn default_button() -> u8 {
    1
}

#[derive(Deserialize)]
struct TypeRequest {
    text: String,
}

#[derive(Deserialize)]
struct KeyRequest {
    chord: String,
}

#[derive(Deserialize)]
struct ActivateRequest {
    id: String,
}

#[derive(Deserialize)]
struct StartRequest {
    #[serde(default)]
    goal: Option<String>,
    #[serde(default)]
    step_budget: Option<u32>,
    /// Seconds from now until the run's deadline.
    #[serde(default)]
    deadline_secs: Option<u64>,
}

#[derive(Deserialize)]
struct ActivityParams {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    100
}

// ── Router ─────────────────────────────────────────────────────

/// Build the Axum router.
pub fn build_router(config: ServerConfig, ctx: ServerContext) -> Router {
    let state = Arc::new(AppState {
        config: config.clone(),
        ctx,
        metrics: metrics::Metrics::new(),
    });

    let api_routes = Router::new()
        .route("/api/v1/move", post(move_handler))
        .route("/api/v1/click", post(click_handler))
        .route("/api/v1/type", post(type_handler))
        .route("/api/v1/key", post(key_handler))
        .route("/api/v1/windows", get(windows_handler))
        .route("/api/v1/activate", post(activate_handler))
        .route("/api/v1/screenshot", get(screenshot_handler))
        .route("/api/v1/autonomy/start", post(autonomy_start_handler))
        .route("/api/v1/autonomy/stop", post(autonomy_stop_handler))
        .route("/api/v1/emergency-stop", post(emergency_stop_handler))
        .route(
            "/api/v1/emergency-stop/reset",
            post(emergency_reset_handler),
        )
        .route("/api/v1/status", get(status_handler))
        .route("/api/v1/activity", get(activity_handler));

    // Apply bearer auth to the API routes when a key is configured.
    let api_routes = if state.config.api_key.is_some() {
        api_routes.layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
    } else {
        api_routes
    };

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(api_routes)
        .with_state(state.clone());

    if config.cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
}

/// Middleware that checks the Authorization header against the configured API key.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(ref expected_key) = state.config.api_key {
        let provided = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match provided {
            Some(key) if key == expected_key => {}
            _ => {
                warn!("unauthorized API request — invalid or missing API key");
                return Err(StatusCode::UNAUTHORIZED);
            }
        }
    }
    Ok(next.run(request).await)
}

// ── Outcome mapping ────────────────────────────────────────────

/// Map an executor result to a structured outcome response. Every control
/// operation resolves to success / veto / failure with a reason.
fn respond(state: &AppState, result: vigil_core::Result<ActionOutput>) -> Response {
    match result {
        Ok(_) => {
            state.metrics.inc_actions_executed();
            (StatusCode::OK, Json(json!({ "status": "executed" }))).into_response()
        }
        Err(e) => error_response(state, e),
    }
}

fn error_response(state: &AppState, error: VigilError) -> Response {
    match error {
        VigilError::Vetoed { reason } => {
            state.metrics.inc_actions_vetoed();
            (
                StatusCode::FORBIDDEN,
                Json(json!({ "status": "vetoed", "reason": reason })),
            )
                .into_response()
        }
        VigilError::Device(reason) => {
            state.metrics.inc_actions_failed();
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "status": "failed", "reason": reason })),
            )
                .into_response()
        }
        VigilError::Capture(reason) => {
            state.metrics.inc_actions_failed();
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "failed", "reason": reason })),
            )
                .into_response()
        }
        e @ VigilError::InvalidState { .. } => (
            StatusCode::CONFLICT,
            Json(json!({ "status": "invalid_state", "reason": e.to_string() })),
        )
            .into_response(),
        e => {
            state.metrics.inc_actions_failed();
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "failed", "reason": e.to_string() })),
            )
                .into_response()
        }
    }
}

// ── Action handlers ────────────────────────────────────────────

async fn move_handler(State(state): State<Arc<AppState>>, Json(req): Json<MoveRequest>) -> Response {
    state.metrics.inc_http_requests();
    let result = state
        .ctx
        .executor
        .execute(Action::Move { x: req.x, y: req.y }, ActionSource::Api)
        .await;
    respond(&state, result)
}

async fn click_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClickRequest>,
) -> Response {
    state.metrics.inc_http_requests();
    let result = state
        .ctx
        .executor
        .execute(
            Action::Click {
                button: req.button,
                x: req.x,
                y: req.y,
            },
            ActionSource::Api,
        )
        .await;
    respond(&state, result)
}

async fn type_handler(State(state): State<Arc<AppState>>, Json(req): Json<TypeRequest>) -> Response {
    state.metrics.inc_http_requests();
    let result = state
        .ctx
        .executor
        .execute(Action::TypeText { text: req.text }, ActionSource::Api)
        .await;
    respond(&state, result)
}

async fn key_handler(State(state): State<Arc<AppState>>, Json(req): Json<KeyRequest>) -> Response {
    state.metrics.inc_http_requests();
    let result = state
        .ctx
        .executor
        .execute(Action::KeyChord { chord: req.chord }, ActionSource::Api)
        .await;
    respond(&state, result)
}

async fn windows_handler(State(state): State<Arc<AppState>>) -> Response {
    state.metrics.inc_http_requests();
    match state
        .ctx
        .executor
        .execute(Action::ListWindows, ActionSource::Api)
        .await
    {
        Ok(ActionOutput::Windows(windows)) => {
            state.metrics.inc_actions_executed();
            (StatusCode::OK, Json(json!({ "windows": windows }))).into_response()
        }
        Ok(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "failed", "reason": "unexpected executor output" })),
        )
            .into_response(),
        Err(e) => error_response(&state, e),
    }
}

async fn activate_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ActivateRequest>,
) -> Response {
    state.metrics.inc_http_requests();
    let result = state
        .ctx
        .executor
        .execute(Action::ActivateWindow { id: req.id }, ActionSource::Api)
        .await;
    respond(&state, result)
}

/// Returns raw PNG bytes. Read-only: bypasses the governor but is still
/// captured through the normal path and logged.
async fn screenshot_handler(State(state): State<Arc<AppState>>) -> Response {
    state.metrics.inc_http_requests();
    match state
        .ctx
        .executor
        .execute(Action::Screenshot, ActionSource::Api)
        .await
    {
        Ok(ActionOutput::Frame(frame)) => {
            state.metrics.inc_actions_executed();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "image/png")],
                frame.png,
            )
                .into_response()
        }
        Ok(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "failed", "reason": "unexpected executor output" })),
        )
            .into_response(),
        Err(e) => error_response(&state, e),
    }
}

// ── Autonomy control ───────────────────────────────────────────

async fn autonomy_start_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> Response {
    state.metrics.inc_http_requests();
    let task = TaskSpec {
        goal: req.goal,
        step_budget: req.step_budget.unwrap_or(state.ctx.default_step_budget),
        deadline: req
            .deadline_secs
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs as i64)),
    };
    match state.ctx.autonomy.start(task) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "executed", "state": state.ctx.autonomy.state() })),
        )
            .into_response(),
        Err(e) => error_response(&state, e),
    }
}

async fn autonomy_stop_handler(State(state): State<Arc<AppState>>) -> Response {
    state.metrics.inc_http_requests();
    match state.ctx.autonomy.request_stop() {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "executed", "state": state.ctx.autonomy.state() })),
        )
            .into_response(),
        Err(e) => error_response(&state, e),
    }
}

/// Idempotent: latches the flag, wakes the loop, always acks.
async fn emergency_stop_handler(State(state): State<Arc<AppState>>) -> Response {
    state.metrics.inc_http_requests();
    state.metrics.inc_emergency_stops();
    state.ctx.governor.trigger_emergency_stop();
    state.ctx.autonomy.notify_emergency();
    state
        .ctx
        .log
        .record_control(ControlEvent::EmergencyStop, ActionOutcome::Executed);
    (StatusCode::OK, Json(json!({ "status": "executed" }))).into_response()
}

async fn emergency_reset_handler(State(state): State<Arc<AppState>>) -> Response {
    state.metrics.inc_http_requests();
    state.ctx.governor.reset_emergency_stop();
    state
        .ctx
        .log
        .record_control(ControlEvent::ResetEmergencyStop, ActionOutcome::Executed);
    (StatusCode::OK, Json(json!({ "status": "executed" }))).into_response()
}

// ── Introspection ──────────────────────────────────────────────

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.metrics.inc_http_requests();
    Json(json!({
        "state": state.ctx.autonomy.state(),
        "emergency_stop": state.ctx.governor.is_emergency_stopped(),
        "rate_occupancy": state.ctx.governor.rate_occupancy(),
        "activity_len": state.ctx.log.len(),
        "uptime_secs": state.metrics.uptime_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn activity_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ActivityParams>,
) -> Json<serde_json::Value> {
    state.metrics.inc_http_requests();
    Json(json!({ "records": state.ctx.log.recent(params.limit) }))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.metrics.inc_http_requests();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.metrics.uptime_secs(),
    }))
}

async fn metrics_handler(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let body = state.metrics.render_prometheus();
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

// ── Entry point ────────────────────────────────────────────────

/// Start the HTTP server.
pub async fn start_server(config: ServerConfig, ctx: ServerContext) -> vigil_core::Result<()> {
    let listen = config.listen.clone();
    let router = build_router(config, ctx);

    info!(listen = %listen, "starting control surface");

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .map_err(|e| VigilError::Config(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, router).await.map_err(VigilError::Io)?;

    Ok(())
}
