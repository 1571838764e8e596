//! Axum-based HTTP gateway for the QR login handshake.
//!
//! - `POST /api/qrlogin/generate` mints a session and returns its QR code
//! - `GET  /api/qrlogin/status/{sessionId}` is polled by the browser
//! - `POST /api/qrlogin/confirm` is called by the scanning device
//! - `/mobile/confirm` serves the page the QR code points at
//!
//! Request bodies are capped at 64KB and requests time out after 30s.

pub mod confirm;

use crate::config::Config;
use crate::login::token::{looks_like_session_id, redact};
use crate::login::{LoginSession, LoginSessionStore};
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB)
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s). Every handler is a short in-memory operation.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<LoginSessionStore>,
    /// Configured base for confirmation URLs; `None` derives it from the request.
    pub frontend_url: Option<Arc<str>>,
    /// Base URL for this gateway (e.g. "http://127.0.0.1:3000").
    pub gateway_base_url: String,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        let sessions = LoginSessionStore::new()
            .with_default_user_info(config.login.default_user_info.clone());
        Self {
            sessions: Arc::new(sessions),
            frontend_url: config
                .login
                .frontend_url
                .as_deref()
                .map(|url| Arc::from(url.trim_end_matches('/'))),
            gateway_base_url: format!("http://{}:{}", config.gateway.host, config.gateway.port),
        }
    }

    /// Base for confirmation URLs: configured frontend, else the request's
    /// `Host`, else this gateway's own address.
    fn confirmation_base(&self, headers: &HeaderMap) -> String {
        if let Some(url) = &self.frontend_url {
            return url.to_string();
        }
        headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(|host| format!("http://{host}"))
            .unwrap_or_else(|| self.gateway_base_url.clone())
    }
}

/// Whether binding `host` would expose the gateway beyond this machine.
pub fn is_public_bind(host: &str) -> bool {
    let host = host.trim().trim_start_matches('[').trim_end_matches(']');
    if host.eq_ignore_ascii_case("localhost") {
        return false;
    }
    match host.parse::<IpAddr>() {
        Ok(ip) => !ip.is_loopback(),
        Err(_) => true,
    }
}

/// Build the router with CORS, body limit and timeout layers.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/qrlogin/generate", post(handle_generate))
        .route("/api/qrlogin/status/{session_id}", get(handle_status))
        .route("/api/qrlogin/confirm", post(handle_confirm))
        .route("/mobile/confirm", get(confirm::handle_confirm_page))
        .route("/mobile/confirm", post(confirm::handle_confirm_submit))
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

/// Run the HTTP gateway until Ctrl-C.
pub async fn run_gateway(config: Config) -> Result<()> {
    let host = config.gateway.host.as_str();
    let port = config.gateway.port;

    // ── Security: refuse public bind without explicit opt-in ──
    if is_public_bind(host) && !config.gateway.allow_public_bind {
        anyhow::bail!(
            "Refusing to bind to {host}: the login gateway would be exposed directly.\n\
             Fix: use --host 127.0.0.1 (default) behind a reverse proxy, or set\n\
             [gateway] allow_public_bind = true in config.toml."
        );
    }

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid listen address {host}:{port}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local = listener.local_addr()?;

    let state = AppState::from_config(&config);

    if config.login.sweep_interval_secs > 0 {
        spawn_sweeper(
            Arc::clone(&state.sessions),
            Duration::from_secs(config.login.sweep_interval_secs),
        );
    }

    tracing::info!(
        addr = %local,
        frontend = state.frontend_url.as_deref().unwrap_or("<request host>"),
        "QR login gateway listening"
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("QR login gateway stopped");
    Ok(())
}

/// Periodically evict aged-out sessions. Reads and creates still enforce
/// expiry on their own; this only keeps the map from holding dead entries.
fn spawn_sweeper(sessions: Arc<LoginSessionStore>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = sessions.sweep_expired();
            if removed > 0 {
                tracing::debug!(removed, "Swept expired login sessions");
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub session_id: String,
    /// `data:image/png;base64,...`
    pub qr_code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub session_id: String,
    pub status: String,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub user_info: Option<String>,
}

impl From<LoginSession> for StatusResponse {
    fn from(session: LoginSession) -> Self {
        Self {
            session_id: session.id,
            status: session.status.to_string(),
            confirmed_at: session.confirmed_at,
            user_info: session.user_info,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBody {
    pub session_id: String,
    #[serde(default)]
    pub user_info: Option<String>,
}

fn message(status: StatusCode, msg: &str) -> Response {
    (status, Json(serde_json::json!({ "message": msg }))).into_response()
}

/// GET /health
async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "activeSessions": state.sessions.active_count(),
    }))
}

/// POST /api/qrlogin/generate — mint a session and its QR code.
async fn handle_generate(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let base = state.confirmation_base(&headers);

    let session = match state.sessions.create(&base) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Login session creation failed: {e}");
            return message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create login session");
        }
    };

    let qr_code = match crate::qr::render_png_data_url(&session.confirmation_url) {
        Ok(q) => q,
        Err(e) => {
            tracing::error!(session = redact(&session.id), "QR rendering failed: {e:#}");
            return message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to render QR code");
        }
    };

    let body = GenerateResponse {
        expires_at: session.expires_at(state.sessions.ttl()),
        session_id: session.id,
        qr_code,
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// GET /api/qrlogin/status/{sessionId} — polled by the waiting browser.
async fn handle_status(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    if !looks_like_session_id(&session_id) {
        return message(StatusCode::NOT_FOUND, "Session not found or expired");
    }
    match state.sessions.get(&session_id) {
        Some(session) => (StatusCode::OK, Json(StatusResponse::from(session))).into_response(),
        None => message(StatusCode::NOT_FOUND, "Session not found or expired"),
    }
}

/// POST /api/qrlogin/confirm — called on behalf of the scanning device.
async fn handle_confirm(
    State(state): State<AppState>,
    body: Result<Json<ConfirmBody>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return message(StatusCode::BAD_REQUEST, "Invalid request body");
    };

    if state
        .sessions
        .confirm(&body.session_id, body.user_info.as_deref())
    {
        message(StatusCode::OK, "Login confirmed successfully")
    } else {
        message(StatusCode::BAD_REQUEST, "Invalid or expired session")
    }
}
