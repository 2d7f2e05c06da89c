//! Session termination
//!
//! Ends the session when credentials can no longer be recovered. Clearing
//! the store always happens before navigation so the destination never sees
//! a half-signed-in state.
//!
//! Termination is idempotent per session: concurrent refresh failures and
//! repeated calls produce one store mutation and one navigation. `rearm()`
//! opens the next session after a successful login.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use session_auth::CredentialStore;
use tracing::{info, warn};

use crate::config::SessionRoutes;
use crate::metrics::{self, TerminationReason};

/// Where the application goes when the session boundary moves.
///
/// A CLI logs or prints the route; a UI shell would swap screens.
pub trait Navigator: Send + Sync {
    /// Ordinary in-app navigation.
    fn navigate(&self, route: &str);

    /// Forced full reset: application state is discarded, not just the view.
    fn reload(&self, route: &str);
}

/// Navigator that only logs. Used when the caller has no UI to drive.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, route: &str) {
        info!(route, "navigate");
    }

    fn reload(&self, route: &str) {
        info!(route, "reload");
    }
}

pub struct SessionTerminator {
    store: Arc<CredentialStore>,
    navigator: Arc<dyn Navigator>,
    routes: SessionRoutes,
    terminated: AtomicBool,
    account_removed: AtomicBool,
    removal_detail: Mutex<Option<String>>,
}

impl std::fmt::Debug for SessionTerminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTerminator")
            .field("routes", &self.routes)
            .field("terminated", &self.terminated.load(Ordering::Acquire))
            .field("account_removed", &self.account_removed.load(Ordering::Acquire))
            .finish()
    }
}

impl SessionTerminator {
    pub fn new(
        store: Arc<CredentialStore>,
        navigator: Arc<dyn Navigator>,
        routes: SessionRoutes,
    ) -> Self {
        Self {
            store,
            navigator,
            routes,
            terminated: AtomicBool::new(false),
            account_removed: AtomicBool::new(false),
            removal_detail: Mutex::new(None),
        }
    }

    pub fn routes(&self) -> &SessionRoutes {
        &self.routes
    }

    /// Whether the current session has already been ended.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Server message that removed the account in this session, if any.
    pub fn removal_detail(&self) -> Option<String> {
        self.removal_detail.lock().clone()
    }

    /// End the session after an unrecoverable credential failure.
    ///
    /// Returns `false` when this session was already terminated; nothing is
    /// cleared or navigated a second time.
    pub async fn terminate(&self, reason: TerminationReason) -> bool {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return false;
        }
        warn!(%reason, route = %self.routes.session_expired_route, "session terminated");
        metrics::record_termination(reason);
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to persist cleared credentials");
        }
        self.navigator.navigate(&self.routes.session_expired_route);
        true
    }

    /// Stricter termination for an account the server reports as removed.
    ///
    /// In-memory credentials are cleared synchronously on every call, before
    /// the first await. The forced reload happens once per session and also
    /// marks the session terminated, so a refresh failure racing with it does
    /// not navigate again.
    pub async fn account_removed(&self, detail: &str) -> bool {
        self.store.clear_now();
        self.removal_detail
            .lock()
            .get_or_insert_with(|| detail.to_string());
        self.terminated.store(true, Ordering::Release);
        if self.account_removed.swap(true, Ordering::AcqRel) {
            return false;
        }
        warn!(detail, "account permanently removed, resetting application state");
        metrics::record_termination(TerminationReason::AccountRemoved);
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to persist cleared credentials");
        }
        self.navigator.reload(&self.routes.login_route);
        true
    }

    /// User-initiated sign-out.
    pub async fn logout(&self) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to persist cleared credentials");
        }
        metrics::record_termination(TerminationReason::Logout);
        info!("signed out");
        self.navigator.navigate(&self.routes.login_route);
    }

    /// Start a new session: allow the next termination to run.
    pub fn rearm(&self) {
        self.terminated.store(false, Ordering::Release);
        self.account_removed.store(false, Ordering::Release);
        *self.removal_detail.lock() = None;
    }
}
