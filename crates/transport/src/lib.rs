//! Wire transport abstraction for the authenticated API client
//!
//! Defines the `Transport` trait that decouples the credential policy
//! (interceptors, refresh coordination) from the library that actually moves
//! bytes. `ReqwestTransport` is the production implementation; tests plug in
//! scripted transports through the same trait.
//!
//! A transport only reports what happened on the wire. It never inspects
//! status codes beyond building the `ApiResponse`, never attaches credentials
//! and never retries.

pub mod error;
pub mod message;
pub mod reqwest_transport;

pub use error::{Error, Result};
pub use message::{ApiRequest, ApiResponse, FormPart, MultipartForm, RequestBody};
pub use reqwest_transport::ReqwestTransport;

pub use reqwest::Method;
pub use reqwest::StatusCode;
pub use reqwest::header;

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by `Transport::send`.
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>>;

/// Abstraction over the wire-level request library.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn Transport>`), so the pipeline can be assembled at runtime.
pub trait Transport: Send + Sync {
    /// Identifier for logging (e.g. "reqwest", "scripted")
    fn id(&self) -> &str;

    /// Transmit one request and return the completed response.
    ///
    /// Any HTTP status, including 4xx/5xx, is a successful transmission and
    /// comes back as `Ok`. `Err` is reserved for failures where no response
    /// was observed (connect errors, timeouts, unreadable bodies).
    fn send<'a>(&'a self, request: &'a ApiRequest) -> SendFuture<'a>;
}
