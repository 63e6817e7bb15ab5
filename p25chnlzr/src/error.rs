use crate::codec::{CodecError, ErrorCode, MessageKind};
use crate::negotiation::Phase;
use std::time::Duration;
use thiserror::Error;

/// Why a channel could not be acquired, or why a streaming source closed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChnlzrError {
    #[error("unable to connect to {host}: {reason}")]
    ConnectFailed { host: String, reason: String },
    #[error("chnlzr replied with error {code}")]
    Protocol { code: ErrorCode },
    #[error("unexpected {observed} message while {phase}")]
    UnexpectedMessage { phase: Phase, observed: MessageKind },
    #[error("IO error: {0}")]
    Io(String),
    #[error("channel request cancelled")]
    Cancelled,
    #[error("channel request timed out after {0:?}")]
    Timeout(Duration),
}

impl ChnlzrError {
    pub fn connect_failed(host: impl ToString, reason: impl ToString) -> Self {
        ChnlzrError::ConnectFailed {
            host: host.to_string(),
            reason: reason.to_string(),
        }
    }

    /// The host, or every host, refused the request.
    pub fn is_denial(&self) -> bool {
        matches!(self, ChnlzrError::Protocol { .. })
    }

    /// Caller-side cancellation or timeout, not a fault of the host.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ChnlzrError::Cancelled | ChnlzrError::Timeout(_))
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ChnlzrError::Protocol { code } => Some(*code),
            _ => None,
        }
    }
}

impl From<CodecError> for ChnlzrError {
    fn from(err: CodecError) -> Self {
        ChnlzrError::Io(err.to_string())
    }
}

impl From<std::io::Error> for ChnlzrError {
    fn from(err: std::io::Error) -> Self {
        ChnlzrError::Io(err.to_string())
    }
}
