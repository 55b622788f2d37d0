//! HTTP surface of the control panel.
//!
//! Thin translation layer: every handler resolves the bearer token to an
//! owner identity, calls the supervisor façade, and maps the error taxonomy
//! onto stable status codes. No supervision logic lives here.
//!
//! ```text
//! POST /api/register  {username, password}        → 200 | 409
//! POST /api/login     {username, password}        → 200 {token} | 401
//! POST /api/logout    (bearer)                    → 200
//! POST /api/upload    multipart "file"            → 200 {path}
//! GET  /api/bots                                  → 200 {bots: [...]}
//! POST /api/start     {path}                      → 200 | 403 | 404 | 409 | 500
//! POST /api/stop      {path}                      → 200 | 403 | 404 | 409
//! GET  /api/status?path=…                         → 200 {state, pid, exit}
//! GET  /api/console   (websocket, ?token=…)       → live console stream
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::server::auth::{AuthError, AuthService};
use crate::server::ws;
use crate::{Supervisor, StartError, StatusError, StopError};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<Supervisor>,
    pub auth: Arc<AuthService>,
    /// Root directory for uploaded bot executables
    /// (`<bots_dir>/<owner>/<filename>`).
    pub bots_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(supervisor: Arc<Supervisor>, auth: Arc<AuthService>, bots_dir: PathBuf) -> Self {
        Self {
            supervisor,
            auth,
            bots_dir: Arc::new(bots_dir),
        }
    }
}

/// Builds the panel router with tracing and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/upload", post(upload))
        .route("/api/bots", get(list_bots))
        .route("/api/start", post(start))
        .route("/api/stop", post(stop))
        .route("/api/status", get(status))
        .route("/api/console", get(ws::console))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// One error shape for the whole API: `{ "error": … }` plus a status code.
pub(crate) enum ApiError {
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, msg) = match self {
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (code, Json(json!({ "error": msg }))).into_response()
    }
}

impl From<StartError> for ApiError {
    fn from(err: StartError) -> Self {
        match err {
            StartError::AlreadyRunning => ApiError::Conflict(err.to_string()),
            StartError::Forbidden => ApiError::Forbidden,
            StartError::NotFound => ApiError::NotFound,
            StartError::SpawnFailed { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<StopError> for ApiError {
    fn from(err: StopError) -> Self {
        match err {
            StopError::NotRunning => ApiError::Conflict(err.to_string()),
            StopError::Forbidden => ApiError::Forbidden,
            StopError::NotFound => ApiError::NotFound,
        }
    }
}

impl From<StatusError> for ApiError {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::Forbidden => ApiError::Forbidden,
            StatusError::NotFound => ApiError::NotFound,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UserExists => ApiError::Conflict(err.to_string()),
            AuthError::BadCredentials => ApiError::Unauthenticated,
        }
    }
}

/// Resolves the `Authorization: Bearer …` header to an owner identity.
pub(crate) fn owner_of(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthenticated)?;
    state.auth.verify(token).ok_or(ApiError::Unauthenticated)
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct BotPath {
    path: String,
}

async fn register(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if creds.username.is_empty() || creds.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username and password are required".to_string(),
        ));
    }
    state.auth.register(&creds.username, &creds.password)?;
    tracing::info!(user = %creds.username, "account registered");
    Ok(Json(json!({ "success": true })))
}

async fn login(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = state.auth.login(&creds.username, &creds.password)?;
    Ok(Json(json!({ "token": token })))
}

/// Revokes the caller's bearer token. Idempotent.
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthenticated)?;
    state.auth.logout(token);
    Ok(Json(json!({ "success": true })))
}

/// Accepts one multipart `file` field, places it under the owner's bot
/// directory, marks it executable, and registers it in the catalog.
async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner = owner_of(&state, &headers)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("file field needs a filename".to_string()))?;
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(ApiError::BadRequest("invalid filename".to_string()));
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let dir = state.bots_dir.join(&owner);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let dest = dir.join(&name);
        tokio::fs::write(&dest, &data)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o755))
                .await
                .map_err(|e| ApiError::Internal(e.to_string()))?;
        }

        let path = dest.to_string_lossy().into_owned();
        state.supervisor.catalog().add(&owner, &path).await;
        tracing::info!(user = %owner, %path, "bot uploaded");
        return Ok(Json(json!({ "success": true, "path": path })));
    }

    Err(ApiError::BadRequest("missing file field".to_string()))
}

async fn list_bots(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner = owner_of(&state, &headers)?;
    let bots = state.supervisor.list_bots(&owner).await;
    Ok(Json(json!({ "bots": bots })))
}

async fn start(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BotPath>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner = owner_of(&state, &headers)?;
    state.supervisor.start(&owner, &body.path).await?;
    Ok(Json(json!({ "success": true })))
}

async fn stop(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BotPath>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner = owner_of(&state, &headers)?;
    state.supervisor.stop(&owner, &body.path).await?;
    Ok(Json(json!({ "success": true })))
}

async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<BotPath>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner = owner_of(&state, &headers)?;
    let snap = state.supervisor.status(&owner, &query.path).await?;
    Ok(Json(json!({
        "state": snap.state.as_label(),
        "pid": snap.pid,
        "exit": snap.exit.map(|e| e.to_string()),
    })))
}
