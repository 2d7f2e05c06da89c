//! Error types for the authenticated request pipeline

use session_auth::Error as RefreshError;

/// Coarse error categories, stable across message wording changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No response observed (connect failure, timeout, unreadable body)
    NetworkFailure,
    /// 401 that recovery would normally absorb; only seen when recovery is disabled
    AuthorizationExpired,
    /// 401 on a request that was already replayed once after a refresh
    AuthorizationInvalid,
    /// Refresh credential missing, or the refresh call itself failed
    RefreshFailure,
    /// Server reported the account as permanently removed
    AccountTerminated,
    /// Any other non-2xx status surfaced to the caller
    HttpStatus,
    /// Response body did not have the expected shape
    InvalidResponse,
    /// Request could not be built
    InvalidRequest,
}

/// Errors returned to callers of `ApiClient` and the services built on it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("network failure: {0}")]
    Network(#[source] transport::Error),

    #[error("authorization expired ({status}) and recovery is disabled")]
    AuthorizationExpired { status: u16, body: String },

    #[error("authorization rejected after credential refresh ({status}): {body}")]
    AuthorizationInvalid { status: u16, body: String },

    #[error("session expired: credential refresh failed")]
    RefreshFailed(#[source] RefreshError),

    #[error("credential recovery ended before delivering an outcome")]
    RecoveryInterrupted,

    #[error("account permanently removed: {detail}")]
    AccountTerminated { detail: String },

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("credential store error: {0}")]
    Credentials(#[source] RefreshError),
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network(_) => ErrorKind::NetworkFailure,
            Error::AuthorizationExpired { .. } => ErrorKind::AuthorizationExpired,
            Error::AuthorizationInvalid { .. } => ErrorKind::AuthorizationInvalid,
            Error::RefreshFailed(_) | Error::RecoveryInterrupted => ErrorKind::RefreshFailure,
            Error::AccountTerminated { .. } => ErrorKind::AccountTerminated,
            Error::Status { .. } => ErrorKind::HttpStatus,
            Error::InvalidResponse(_) | Error::Credentials(_) => ErrorKind::InvalidResponse,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Error code string for structured output.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NetworkFailure => "network_failure",
            ErrorKind::AuthorizationExpired => "authorization_expired",
            ErrorKind::AuthorizationInvalid => "authorization_invalid",
            ErrorKind::RefreshFailure => "refresh_failure",
            ErrorKind::AccountTerminated => "account_terminated",
            ErrorKind::HttpStatus => "http_status",
            ErrorKind::InvalidResponse => "invalid_response",
            ErrorKind::InvalidRequest => "invalid_request",
        }
    }

    /// HTTP status behind this error, when there was a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::AuthorizationExpired { status, .. }
            | Error::AuthorizationInvalid { status, .. }
            | Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the session is gone and the user must sign in again.
    pub fn ends_session(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RefreshFailure | ErrorKind::AccountTerminated
        )
    }
}

impl From<transport::Error> for Error {
    fn from(err: transport::Error) -> Self {
        match err {
            transport::Error::InvalidRequest(msg) => Error::InvalidRequest(msg),
            other => Error::Network(other),
        }
    }
}
