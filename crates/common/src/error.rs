//! Error types for the Beacon client

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using the Beacon client Error
pub type Result<T> = std::result::Result<T, Error>;

/// Error-kind tag carried by structured server rejections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// The server is still persisting a child of the entity being finished
    FinishNotAllowed,
    NotFound,
    AccessDenied,
    InvalidRequest,
    Other,
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionKind::FinishNotAllowed => write!(f, "finish_not_allowed"),
            RejectionKind::NotFound => write!(f, "not_found"),
            RejectionKind::AccessDenied => write!(f, "access_denied"),
            RejectionKind::InvalidRequest => write!(f, "invalid_request"),
            RejectionKind::Other => write!(f, "other"),
        }
    }
}

/// Beacon client error types
///
/// `Clone` because a single settled outcome is observed by every reader of a
/// deferred handle.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Connection-level failure; the request may never have reached the server
    #[error("transport error: {0}")]
    Transport(String),

    /// Structured rejection reported by the server
    #[error("server rejected request ({kind}): {message}")]
    Rejected { kind: RejectionKind, message: String },

    /// Caller misuse, surfaced as a failed outcome instead of a panic
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("operation timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Connection-level failures that a bounded retry may recover from
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// The one server rejection that is retryable, and only when finishing
    /// an item: the server has not yet durably persisted a reported child.
    pub fn is_finish_not_allowed(&self) -> bool {
        matches!(
            self,
            Error::Rejected {
                kind: RejectionKind::FinishNotAllowed,
                ..
            }
        )
    }
}
