use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use p25chnlzr::ChnlzrError;
use p25model::{ChannelId, ValidationError};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Why a resource call failed, and the status it answers with.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("invalid request: {0}")]
    Invalid(#[from] ValidationError),

    /// 409: the identity is monitored, pending re-qualification, or being requested.
    #[error("{0} is already monitored")]
    Conflict(ChannelId),

    /// 503: the channelizers refused the channel or dropped it.
    #[error("{0}")]
    Unavailable(String),

    /// 504
    #[error("channel request timed out")]
    Timeout,

    /// 500
    #[error("{0}")]
    Internal(String),
}

/// Body of every error response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl ResourceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ResourceError::Invalid(_) => StatusCode::BAD_REQUEST,
            ResourceError::Conflict(_) => StatusCode::CONFLICT,
            ResourceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ResourceError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ResourceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps a failed acquisition of `id`, logging it.
    pub fn acquisition(id: &ChannelId, err: ChnlzrError) -> Self {
        if let Some(code) = err.code() {
            warn!("{} channel request not granted: {}", id, code);
            ResourceError::Unavailable(err.to_string())
        } else if err.is_cancellation() {
            warn!("{} channel request timed out", id);
            ResourceError::Timeout
        } else {
            error!("{} unexpected channel request error: {}", id, err);
            ResourceError::Internal(err.to_string())
        }
    }

    /// Maps the close of a source that was expected to keep streaming, logging it.
    pub fn source_closed(id: &ChannelId, closed: Result<(), ChnlzrError>) -> Self {
        log_source_closed(id, &closed);
        match closed {
            Ok(()) => {
                ResourceError::Unavailable("chnlzr connection closed unexpectedly".to_string())
            }
            Err(err) if err.is_denial() => ResourceError::Unavailable(err.to_string()),
            Err(err) => ResourceError::Internal(err.to_string()),
        }
    }
}

pub(crate) fn log_source_closed(id: &ChannelId, closed: &Result<(), ChnlzrError>) {
    match closed {
        Ok(()) => warn!("{} chnlzr connection closed unexpectedly", id),
        Err(err) if err.is_denial() => warn!("{} chnlzr closed connection with error: {}", id, err),
        Err(err) => error!("{} unexpected chnlzr error: {}", id, err),
    }
}

impl IntoResponse for ResourceError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
