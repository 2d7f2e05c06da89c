//! Error types for wire transport operations

/// Failures where no HTTP response was observed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else if err.is_builder() {
            Error::InvalidRequest(err.to_string())
        } else if err.is_body() || err.is_decode() {
            Error::Body(err.to_string())
        } else {
            Error::Connect(err.to_string())
        }
    }
}
