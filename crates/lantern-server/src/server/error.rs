//! Unified error type for the puzzle service.
//!
//! Mirrors the error taxonomy of the HTTP boundary: malformed input is
//! rejected up front, an unsolvable board is a semantic rejection rather
//! than a fault, and storage or synthesis faults surface as server errors
//! instead of being swallowed.

use crate::server::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

pub type Result<T> = core::result::Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The client request was malformed or exceeded bounds.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Missing, malformed, or unlisted bearer token.
    #[error("missing or invalid bearer token")]
    Unauthorized,

    /// The submitted board admits no valid light placement.
    #[error("board is unsolvable")]
    Unsolvable,

    /// Board synthesis failed on the synchronous cache-miss path.
    #[error("board synthesis failed: {0}")]
    Synthesis(#[from] lantern::Error),

    /// The underlying board pool is unavailable or corrupt.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Internal channel send failure (closed or full worker queue).
    #[error("channel error: {context}")]
    Channel { context: String },

    /// A request arrived while the service was shutting down.
    #[error("service is shutting down")]
    Shutdown,

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ServiceError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Unsolvable => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
            Self::Synthesis(_) | Self::Store(_) | Self::Channel { .. } | Self::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
