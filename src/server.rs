//! JSON HTTP server.
//!
//! Exposes the index and the context assembler over HTTP for editor and
//! viewer integrations.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (version, index readiness) |
//! | `GET`  | `/structure` | Detected headings and document totals |
//! | `POST` | `/locate` | Global line indices matching a fragment |
//! | `POST` | `/occurrences` | Windowed occurrences of a fragment |
//! | `POST` | `/headings` | Headings matching a query, with context |
//! | `POST` | `/context` | Budgeted context for an instruction |
//! | `POST` | `/reload` | Rebuild from the transcript file if it changed |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "budget must be > 0" } }
//! ```
//!
//! Error codes: `bad_request` (400), `reload_failed` (500), `internal` (500).
//! Lookups never fail: an index that cannot be built yields empty results.
//!
//! # Concurrency
//!
//! The current [`IndexGate`] sits behind an `RwLock<Arc<_>>`; handlers clone
//! the `Arc` and release the lock immediately. Index builds and assembly are
//! CPU-bound and run on the blocking pool.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pagectx_core::{
    assemble, AssembledContext, AssemblyParams, AssemblyRequest, DocumentStructure, HeadingMatch,
    IndexGate, Occurrence,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::transcript::open_gate;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    params: Arc<AssemblyParams>,
    /// Swapped wholesale by `/reload`.
    gate: Arc<RwLock<Arc<IndexGate>>>,
}

impl AppState {
    fn new(config: &Config) -> Self {
        Self {
            config: Arc::new(config.clone()),
            params: Arc::new(config.retrieval.to_assembly_params()),
            gate: Arc::new(RwLock::new(Arc::new(open_gate(config)))),
        }
    }

    fn current_gate(&self) -> Arc<IndexGate> {
        match self.gate.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace_gate(&self, gate: Arc<IndexGate>) {
        match self.gate.write() {
            Ok(mut guard) => *guard = gate,
            Err(poisoned) => *poisoned.into_inner() = gate,
        }
    }
}

/// All endpoints with permissive CORS.
fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/structure", get(handle_structure))
        .route("/locate", post(handle_locate))
        .route("/occurrences", post(handle_occurrences))
        .route("/headings", post(handle_headings))
        .route("/context", post(handle_context))
        .route("/reload", post(handle_reload))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`.
///
/// The index is warmed on the blocking pool at startup; requests arriving
/// before it is ready wait on the same single build.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState::new(config);

    let gate = state.current_gate();
    tokio::task::spawn_blocking(move || {
        if let Some(index) = gate.get() {
            tracing::info!(fingerprint = index.fingerprint(), "index ready");
        }
    });

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        bind = %bind_addr,
        transcript = %config.transcript.path.display(),
        "server listening"
    );
    println!("pagectx server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

fn reload_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "reload_failed".to_string(),
        message: message.into(),
    }
}

/// Unwrap a JSON body, reporting malformed input in the error contract shape.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| bad_request(e.body_text()))
}

/// Run `f` against the current gate on the blocking pool.
async fn with_gate<T, F>(state: &AppState, f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&IndexGate) -> T + Send + 'static,
{
    let gate = state.current_gate();
    tokio::task::spawn_blocking(move || f(&gate))
        .await
        .map_err(|e| internal(format!("worker task failed: {}", e)))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    /// Whether the index has been built.
    ready: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ready: state.current_gate().is_ready(),
    })
}

// ============ GET /structure ============

async fn handle_structure(
    State(state): State<AppState>,
) -> Result<Json<DocumentStructure>, AppError> {
    let structure = with_gate(&state, |gate| gate.structure()).await?;
    Ok(Json(structure))
}

// ============ POST /locate ============

#[derive(Deserialize)]
struct LocateRequest {
    fragment: String,
}

#[derive(Serialize)]
struct LocateResponse {
    lines: Vec<usize>,
}

async fn handle_locate(
    State(state): State<AppState>,
    payload: Result<Json<LocateRequest>, JsonRejection>,
) -> Result<Json<LocateResponse>, AppError> {
    let req = body(payload)?;
    let lines = with_gate(&state, move |gate| gate.locate_lines(&req.fragment)).await?;
    Ok(Json(LocateResponse { lines }))
}

// ============ POST /occurrences ============

#[derive(Deserialize)]
struct OccurrencesRequest {
    fragment: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct OccurrencesResponse {
    occurrences: Vec<Occurrence>,
}

async fn handle_occurrences(
    State(state): State<AppState>,
    payload: Result<Json<OccurrencesRequest>, JsonRejection>,
) -> Result<Json<OccurrencesResponse>, AppError> {
    let req = body(payload)?;
    let limit = req.limit.unwrap_or(state.config.retrieval.max_occurrences);
    let occurrences =
        with_gate(&state, move |gate| gate.windowed_occurrences(&req.fragment, limit)).await?;
    Ok(Json(OccurrencesResponse { occurrences }))
}

// ============ POST /headings ============

#[derive(Deserialize)]
struct HeadingsRequest {
    query: String,
}

#[derive(Serialize)]
struct HeadingsResponse {
    headings: Vec<HeadingMatch>,
}

async fn handle_headings(
    State(state): State<AppState>,
    payload: Result<Json<HeadingsRequest>, JsonRejection>,
) -> Result<Json<HeadingsResponse>, AppError> {
    let req = body(payload)?;
    let headings = with_gate(&state, move |gate| gate.find_headings(&req.query)).await?;
    Ok(Json(HeadingsResponse { headings }))
}

// ============ POST /context ============

#[derive(Deserialize)]
struct ContextRequest {
    document: String,
    #[serde(default)]
    excerpt: Option<String>,
    instruction: String,
    #[serde(default)]
    budget: Option<usize>,
}

async fn handle_context(
    State(state): State<AppState>,
    payload: Result<Json<ContextRequest>, JsonRejection>,
) -> Result<Json<AssembledContext>, AppError> {
    let req = body(payload)?;
    if req.budget == Some(0) {
        return Err(bad_request("budget must be > 0"));
    }

    let params = state.params.clone();
    let ctx = with_gate(&state, move |gate| {
        let request = AssemblyRequest {
            document: &req.document,
            excerpt: req.excerpt.as_deref(),
            instruction: &req.instruction,
            budget: req.budget,
        };
        assemble(gate.get(), &request, &params)
    })
    .await?;
    Ok(Json(ctx))
}

// ============ POST /reload ============

#[derive(Serialize)]
struct ReloadResponse {
    /// True when a new index replaced the previous one.
    reloaded: bool,
    fingerprint: String,
}

/// Build a fresh gate from the transcript file and swap it in when the
/// fingerprint differs from the current index (or none is loaded yet).
async fn handle_reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, AppError> {
    let current = state.current_gate();
    let fresh = Arc::new(open_gate(&state.config));

    let built = {
        let fresh = fresh.clone();
        tokio::task::spawn_blocking(move || {
            let previous = current.loaded().map(|i| i.fingerprint().to_string());
            fresh
                .try_load()
                .map(|index| (index.fingerprint().to_string(), previous))
        })
        .await
        .map_err(|e| internal(format!("worker task failed: {}", e)))?
    };

    let (fingerprint, previous) = built.map_err(|e| reload_failed(e.to_string()))?;
    let reloaded = previous.as_deref() != Some(fingerprint.as_str());
    if reloaded {
        state.replace_gate(fresh);
        tracing::info!(%fingerprint, "index reloaded");
    }

    Ok(Json(ReloadResponse {
        reloaded,
        fingerprint,
    }))
}
