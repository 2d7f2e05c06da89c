//! Session credential handling for the authenticated API client
//!
//! Provides the session-scoped credential store and the two token endpoint
//! interactions (login and refresh). This crate knows nothing about request
//! interception or refresh coordination. It can be tested and used
//! independently of the pipeline.
//!
//! Credential flow:
//! 1. Caller logs in; `token::parse_token_response()` reads `{access, refresh}`
//! 2. Pair stored via `credentials::CredentialStore::set_tokens()`
//! 3. Request interceptor reads `CredentialStore::access()` on every request
//! 4. On 401 the coordinator calls `token::RefreshTransport::refresh()`
//! 5. Rotated tokens saved via `CredentialStore::set_tokens()`
//! 6. Logout or termination calls `CredentialStore::clear()`

pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::CredentialStore;
pub use error::{Error, Result};
pub use token::{CredentialPair, RefreshTransport, parse_token_response};
