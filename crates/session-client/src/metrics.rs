//! Session metrics
//!
//! Recorded through the `metrics` facade; without an installed recorder the
//! calls are no-ops.
//!
//! - `session_refresh_total` (counter): label `outcome` = success | failure
//! - `session_requests_replayed_total` (counter): label `outcome` = ok | error
//! - `session_terminations_total` (counter): label `reason`
//! - `session_refresh_queue_depth` (histogram): queued requests per cycle

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    RefreshFailed,
    AccountRemoved,
    Logout,
}

impl TerminationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminationReason::RefreshFailed => "refresh_failed",
            TerminationReason::AccountRemoved => "account_removed",
            TerminationReason::Logout => "logout",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record the end of a refresh cycle and how many requests it drained.
pub fn record_refresh(success: bool, queue_depth: usize) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("session_refresh_total", "outcome" => outcome).increment(1);
    metrics::histogram!("session_refresh_queue_depth").record(queue_depth as f64);
}

/// Record the outcome of one replayed request.
pub fn record_replay(ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!("session_requests_replayed_total", "outcome" => outcome).increment(1);
}

pub fn record_termination(reason: TerminationReason) {
    metrics::counter!("session_terminations_total", "reason" => reason.as_str()).increment(1);
}
