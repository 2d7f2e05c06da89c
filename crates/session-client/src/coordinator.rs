//! Single-flight credential refresh
//!
//! State machine shared by every request of one client:
//!
//! ```text
//!   Idle ──401──▶ Refreshing{queue=[trigger]} ──401──▶ Refreshing{queue+=req}
//!    ▲                     │
//!    └── drain queue ◀─────┘ refresh settles (success: replay all, failure: reject all)
//! ```
//!
//! The gate is flipped inside a `parking_lot` critical section with no await
//! in it, so two requests failing in the same tick cannot both start a
//! refresh. The cycle itself runs on a spawned task: a caller dropping its
//! future does not strand the requests queued behind it.
//!
//! A cycle belongs to the store generation it started in. If the session is
//! cleared (logout, termination, account removal) before the refresh returns,
//! the issued credentials are dropped and the queue is rejected.

use std::sync::Arc;

use common::Secret;
use parking_lot::Mutex;
use session_auth::{CredentialStore, Error as RefreshError, RefreshTransport};
use tokio::sync::oneshot;
use tracing::{Instrument, debug, info, info_span, warn};
use transport::{ApiRequest, ApiResponse};

use crate::error::{Error, Result};
use crate::metrics::{self, TerminationReason};
use crate::pipeline::Pipeline;
use crate::termination::SessionTerminator;

/// A request parked until the refresh cycle settles.
struct PendingRequest {
    request: ApiRequest,
    request_id: String,
    reply: oneshot::Sender<Result<ApiResponse>>,
}

enum Mode {
    Idle,
    Refreshing { queue: Vec<PendingRequest> },
}

enum Admission {
    /// This request started the cycle in the given store generation.
    Lead(u64),
    Queued,
    /// The credential was already replaced since this request was sent.
    ReplayNow(PendingRequest),
}

pub struct RefreshCoordinator {
    state: Mutex<Mode>,
    pipeline: Arc<Pipeline>,
    refresher: RefreshTransport,
    store: Arc<CredentialStore>,
    terminator: Arc<SessionTerminator>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("queued", &self.queued())
            .field("refresher", &self.refresher)
            .finish()
    }
}

impl RefreshCoordinator {
    pub(crate) fn new(
        pipeline: Arc<Pipeline>,
        refresher: RefreshTransport,
        store: Arc<CredentialStore>,
        terminator: Arc<SessionTerminator>,
    ) -> Self {
        Self {
            state: Mutex::new(Mode::Idle),
            pipeline,
            refresher,
            store,
            terminator,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), Mode::Refreshing { .. })
    }

    /// Requests waiting on the current cycle.
    pub fn queued(&self) -> usize {
        match &*self.state.lock() {
            Mode::Idle => 0,
            Mode::Refreshing { queue } => queue.len(),
        }
    }

    /// Recover a request whose first attempt failed with a recoverable 401.
    ///
    /// Resolves with the replay outcome, or with `RefreshFailed` when the
    /// cycle could not obtain a new credential.
    pub(crate) async fn recover(
        self: &Arc<Self>,
        request: ApiRequest,
        sent_with: Option<Secret<String>>,
        request_id: String,
    ) -> Result<ApiResponse> {
        let (tx, rx) = oneshot::channel();
        let pending = PendingRequest {
            request,
            request_id,
            reply: tx,
        };

        let admission = {
            let mut state = self.state.lock();
            match &mut *state {
                Mode::Refreshing { queue } => {
                    queue.push(pending);
                    Admission::Queued
                }
                Mode::Idle => {
                    let current = self.store.access();
                    if current.is_some() && current != sent_with {
                        Admission::ReplayNow(pending)
                    } else {
                        *state = Mode::Refreshing {
                            queue: vec![pending],
                        };
                        Admission::Lead(self.store.generation())
                    }
                }
            }
        };

        match admission {
            Admission::ReplayNow(pending) => {
                debug!("credential already replaced, replaying without refresh");
                self.replay(pending).await;
            }
            Admission::Lead(generation) => {
                info!(generation, "starting credential refresh");
                tokio::spawn(Arc::clone(self).run_cycle(generation).in_current_span());
            }
            Admission::Queued => debug!("queued behind in-flight credential refresh"),
        }

        rx.await.unwrap_or(Err(Error::RecoveryInterrupted))
    }

    async fn run_cycle(self: Arc<Self>, generation: u64) {
        let outcome = match self.refresher.refresh(&self.store).await {
            // Memory is updated before the first await inside the store
            // write, so replays below always attach the new credential.
            Ok(pair) => match self.store.set_tokens_if_current(generation, pair).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(RefreshError::SessionEnded),
                Err(e) => {
                    warn!(error = %e, "failed to persist refreshed credentials");
                    Ok(())
                }
            },
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                let queue = self.take_queue();
                metrics::record_refresh(true, queue.len());
                info!(queued = queue.len(), "credential refresh succeeded, replaying");

                for pending in queue {
                    if pending.reply.is_closed() {
                        debug!(request_id = %pending.request_id, "caller gone, skipping replay");
                        continue;
                    }
                    let this = Arc::clone(&self);
                    let span = info_span!("replay", request_id = %pending.request_id);
                    tokio::spawn(async move { this.replay(pending).await }.instrument(span));
                }
            }
            Err(e) => self.fail_cycle(generation, e).await,
        }
    }

    /// Settle a cycle that produced no usable credential.
    ///
    /// A rejected refresh whose body reports account removal takes the
    /// account-removal path. A session already cleared during the cycle is
    /// not terminated again. Anything else terminates the session.
    async fn fail_cycle(&self, generation: u64, error: RefreshError) {
        let queue = self.take_queue();
        metrics::record_refresh(false, queue.len());

        let removed = match &error {
            RefreshError::Rejected { body, .. } => self.pipeline.detector().detect_text(body),
            _ => None,
        };
        let removed = if let Some(detail) = removed {
            warn!(queued = queue.len(), "refresh rejected: account permanently removed");
            self.terminator.account_removed(&detail).await;
            Some(detail)
        } else if self.store.generation() != generation {
            info!(
                queued = queue.len(),
                error = %error,
                "session ended during credential refresh, rejecting queued requests"
            );
            self.terminator.removal_detail()
        } else {
            warn!(error = %error, queued = queue.len(), "credential refresh failed");
            self.terminator
                .terminate(TerminationReason::RefreshFailed)
                .await;
            None
        };

        for pending in queue {
            let rejection = match &removed {
                Some(detail) => Error::AccountTerminated {
                    detail: detail.clone(),
                },
                None => Error::RefreshFailed(error.clone()),
            };
            let _ = pending.reply.send(Err(rejection));
        }
    }

    /// Return to `Idle`, handing back everything queued in this cycle.
    fn take_queue(&self) -> Vec<PendingRequest> {
        match std::mem::replace(&mut *self.state.lock(), Mode::Idle) {
            Mode::Idle => Vec::new(),
            Mode::Refreshing { queue } => queue,
        }
    }

    async fn replay(&self, pending: PendingRequest) {
        let replay = pending.request.as_replay();
        let result = self.pipeline.attempt(&replay).await.into_final();
        metrics::record_replay(matches!(&result, Ok(r) if r.is_success()));
        if pending.reply.send(result).is_err() {
            debug!(request_id = %pending.request_id, "caller dropped before replay completed");
        }
    }
}
