//! Authenticated API client with single-flight credential refresh
//!
//! Wraps a `transport::Transport` in a request/response interceptor chain.
//! Every protected call carries the current access credential; a 401 on an
//! eligible request parks it behind one shared refresh cycle, after which it
//! is replayed once with the new credential.
//!
//! Request lifecycle:
//! 1. `RequestInterceptor` attaches `Authorization: Bearer <access>`
//! 2. `ResponseInterceptor` classifies the response (pass-through,
//!    recoverable once, terminal, account removed)
//! 3. Recoverable 401 → `RefreshCoordinator` queues it; the first one starts
//!    the refresh on a spawned task
//! 4. Refresh success → store updated, every queued request replayed with
//!    the retry marker set
//! 5. Refresh failure → `SessionTerminator` ends the session once, every
//!    queued request is rejected with the refresh failure as its source
//! 6. Session cleared while refreshing (logout, account removal) → the new
//!    credentials are discarded and the queue is rejected, never replayed

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod guard;
pub mod interceptor;
pub mod metrics;
mod pipeline;
pub mod resources;
pub mod session;
pub mod termination;

#[cfg(test)]
mod test_support;

pub use client::{ApiClient, expect_success};
pub use config::{AuthConfig, ClientConfig, SessionRoutes};
pub use coordinator::RefreshCoordinator;
pub use error::{Error, ErrorKind, Result};
pub use guard::{RouteDecision, RouteGuard};
pub use interceptor::{
    AccountRemovalDetector, Disposition, EndpointPolicy, RequestInterceptor, ResponseInterceptor,
};
pub use metrics::TerminationReason;
pub use resources::{Accounts, Announcements, Files};
pub use session::{AuthSession, LoginCredentials};
pub use termination::{LogNavigator, Navigator, SessionTerminator};
