//! Error types for credential and token endpoint operations

/// Errors from credential storage and the token endpoints.
///
/// `Clone` so a single refresh failure can be handed to every request that
/// was waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("no refresh credential stored")]
    MissingRefreshToken,

    #[error("token endpoint unreachable: {0}")]
    Transport(#[from] transport::Error),

    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid token response: {0}")]
    MalformedResponse(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// The session was cleared while the refresh was in flight; the issued
    /// credentials were discarded.
    #[error("session ended before the refreshed credentials could be stored")]
    SessionEnded,
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
