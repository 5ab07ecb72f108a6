//! Error types for authenticated API calls
//!
//! Only unrecoverable outcomes reach callers: a recoverable 401 is handled
//! entirely inside the client by refreshing and replaying.

/// Errors surfaced by `AuthClient`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    /// A 401 that could not be recovered: no refresh credential, or the
    /// replay after a refresh was rejected again.
    #[error("authentication failed ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    /// The refresh call failed. Reported instead of the original 401.
    #[error("credential refresh failed: {0}")]
    Refresh(#[source] session::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("session error: {0}")]
    Session(#[from] session::Error),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

impl Error {
    /// Whether the error ended, or should end, the session.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Unauthorized { .. } | Error::Refresh(_))
    }

    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
