//! HTTP API
//!
//! `POST /messages` puts text into a channel without a chat session, e.g.
//! from a script or webhook. The body is JSON `{username, channel, text}`;
//! a missing or empty `channel` means the default channel.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{AppError, ChatError};
use crate::hub::HubHandle;

const HOME: &str = "Hello! Send a message with a POST request to /messages, \
or connect over WebSocket and send {\"name\": \"...\"} to pick a username.\n";

#[derive(Debug, Clone, Deserialize)]
pub struct PostMessage {
    pub username: String,
    #[serde(default)]
    pub channel: Option<String>,
    pub text: String,
}

/// What was broadcast, with the channel resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostReceipt {
    pub username: String,
    pub channel: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Errors returned to HTTP callers
#[derive(Debug)]
pub enum ApiError {
    /// The hub refused the post
    Rejected(ChatError),
    /// The hub isn't running
    Unavailable(AppError),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError::Unavailable(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Rejected(e @ ChatError::UnknownChannel(_)) => {
                (StatusCode::NOT_FOUND, e.to_string())
            }
            ApiError::Rejected(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Unavailable(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Build the API router
pub fn router(hub: HubHandle) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/messages", post(post_message))
        .with_state(hub)
}

async fn home() -> &'static str {
    HOME
}

/// POST /messages
async fn post_message(
    State(hub): State<HubHandle>,
    Json(req): Json<PostMessage>,
) -> ApiResult<Json<PostReceipt>> {
    let channel = hub
        .post(&req.username, req.channel, &req.text)
        .await?
        .map_err(ApiError::Rejected)?;

    Ok(Json(PostReceipt {
        username: req.username.trim().to_string(),
        channel,
        text: req.text.trim().to_string(),
    }))
}

/// Serve the API until the listener fails
pub async fn listen(listener: TcpListener, hub: HubHandle) {
    if let Ok(addr) = listener.local_addr() {
        info!("HTTP API listening on http://{}", addr);
    }
    if let Err(e) = axum::serve(listener, router(hub)).await {
        error!("HTTP server error: {}", e);
    }
}
