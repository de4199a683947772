use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use sigbridge_auth::{AuthError, Credentials};
use sigbridge_core::FeedbackRecord;
use sigbridge_feedback::FeedbackError;
use sigbridge_queue::QueueError;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

pub const TOKEN_HEADER: &str = "x-bridge-token";
pub const TIMESTAMP_HEADER: &str = "x-bridge-ts";
pub const SIGNATURE_HEADER: &str = "x-bridge-sig";

pub fn bridge_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/next", get(next_signal))
        .route("/feedback", post(receive_feedback))
}

// ---------------------------------------------------------------------------
// Error envelope
// ---------------------------------------------------------------------------

/// Normalized failure envelope: `{status:"error", detail, timestamp}` with
/// the mapped HTTP status, so the EA's poll loop can log and retry without
/// special cases.
pub struct ApiError {
    code: StatusCode,
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "status": "error",
            "detail": self.detail,
            "timestamp": Utc::now(),
        }));
        (self.code, body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let code = if err.is_missing_credential() {
            StatusCode::UNAUTHORIZED
        } else {
            StatusCode::FORBIDDEN
        };
        Self {
            code,
            detail: err.to_string(),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        tracing::error!(error = %err, "queue failure");
        Self {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            detail: "signal queue unavailable".to_string(),
        }
    }
}

impl From<FeedbackError> for ApiError {
    fn from(err: FeedbackError) -> Self {
        match err {
            FeedbackError::InvalidInput(detail) => Self {
                code: StatusCode::BAD_REQUEST,
                detail,
            },
            FeedbackError::Io(e) => {
                tracing::error!(error = %e, "feedback log failure");
                Self {
                    code: StatusCode::INTERNAL_SERVER_ERROR,
                    detail: "feedback log unavailable".to_string(),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Auth plumbing
// ---------------------------------------------------------------------------

/// Peer address for policy decisions: first X-Forwarded-For entry when a
/// proxy is in front, socket address otherwise.
fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_else(|| addr.ip())
}

fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    addr: SocketAddr,
    body: &[u8],
) -> Result<(), ApiError> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let creds = Credentials {
        token: header(TOKEN_HEADER),
        timestamp: header(TIMESTAMP_HEADER),
        signature: header(SIGNATURE_HEADER),
    };
    state
        .authenticator
        .authorize(client_ip(headers, addr), &creds, body)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let pending = state.queue.pending_count().await.unwrap_or(0);
    Json(serde_json::json!({
        "status": "ok",
        "service": "sigbridge",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
        "queue_dir": state.queue_dir,
        "pending": pending,
        "token_configured": state.authenticator.token_configured(),
        "hmac_configured": state.authenticator.hmac_configured(),
    }))
}

// ---------------------------------------------------------------------------
// Next signal
// ---------------------------------------------------------------------------

async fn next_signal(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers, addr, b"")?;

    let response = match state.queue.pop_next().await? {
        Some(signal) => Json(serde_json::json!({
            "status": "ok",
            "signal": signal,
            "timestamp": Utc::now(),
        })),
        // An empty queue is the normal idle state, not a fault.
        None => Json(serde_json::json!({
            "status": "empty",
            "message": "No signals in queue",
            "timestamp": Utc::now(),
        })),
    };
    Ok(response.into_response())
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

async fn receive_feedback(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    // The HMAC signature covers the raw body, so auth runs before parsing.
    authorize(&state, &headers, addr, &body)?;

    let record: FeedbackRecord = serde_json::from_slice(&body).map_err(|e| ApiError {
        code: StatusCode::BAD_REQUEST,
        detail: format!("invalid_json: {}", e),
    })?;
    state.feedback.record(&record)?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "message": "Feedback received",
        "timestamp": Utc::now(),
    }))
    .into_response())
}
