//! One pass through the interceptor chain
//!
//! `Pipeline::attempt()` attaches the credential, transmits, and classifies.
//! It settles everything except a recoverable 401, which it hands back to the
//! caller as `Attempt::Recoverable` for the refresh coordinator.

use std::sync::Arc;

use common::Secret;
use tracing::debug;
use transport::{ApiRequest, ApiResponse, Transport};

use crate::error::{Error, Result};
use crate::interceptor::{
    AccountRemovalDetector, Disposition, RequestInterceptor, ResponseInterceptor,
};
use crate::termination::SessionTerminator;

/// Result of a single transmission.
#[derive(Debug)]
pub(crate) enum Attempt {
    /// Final outcome for the caller.
    Complete(Result<ApiResponse>),
    /// 401 eligible for one recovery. `sent_with` is the access credential
    /// the request actually carried.
    Recoverable {
        response: ApiResponse,
        sent_with: Option<Secret<String>>,
    },
}

impl Attempt {
    /// Collapse into a caller outcome, treating a recoverable 401 as final.
    pub(crate) fn into_final(self) -> Result<ApiResponse> {
        match self {
            Attempt::Complete(result) => result,
            Attempt::Recoverable { response, .. } => Err(Error::AuthorizationInvalid {
                status: response.status.as_u16(),
                body: response.text(),
            }),
        }
    }
}

pub(crate) struct Pipeline {
    transport: Arc<dyn Transport>,
    request: RequestInterceptor,
    response: ResponseInterceptor,
    terminator: Arc<SessionTerminator>,
    recover: bool,
}

impl Pipeline {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        request: RequestInterceptor,
        response: ResponseInterceptor,
        terminator: Arc<SessionTerminator>,
        recover: bool,
    ) -> Self {
        Self {
            transport,
            request,
            response,
            terminator,
            recover,
        }
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) fn detector(&self) -> &AccountRemovalDetector {
        self.response.detector()
    }

    pub(crate) async fn attempt(&self, request: &ApiRequest) -> Attempt {
        let (prepared, sent_with) = match self.request.apply(request) {
            Ok(prepared) => prepared,
            Err(e) => return Attempt::Complete(Err(e)),
        };

        let response = match self.transport.send(&prepared).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "transport failure");
                return Attempt::Complete(Err(e.into()));
            }
        };

        match self.response.classify(request, &response) {
            Disposition::PassThrough => Attempt::Complete(Ok(response)),
            Disposition::Terminal => {
                debug!(status = response.status.as_u16(), "authorization rejected after replay");
                Attempt::Complete(Err(Error::AuthorizationInvalid {
                    status: response.status.as_u16(),
                    body: response.text(),
                }))
            }
            Disposition::AccountRemoved { detail } => {
                self.terminator.account_removed(&detail).await;
                Attempt::Complete(Err(Error::AccountTerminated { detail }))
            }
            Disposition::RecoverableOnce if !self.recover => {
                Attempt::Complete(Err(Error::AuthorizationExpired {
                    status: response.status.as_u16(),
                    body: response.text(),
                }))
            }
            Disposition::RecoverableOnce => Attempt::Recoverable {
                response,
                sent_with,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, SessionRoutes};
    use crate::error::ErrorKind;
    use crate::test_support::{Nav, RecordingNavigator, ScriptedTransport, signed_in_store};
    use transport::StatusCode;

    async fn pipeline(
        transport: Arc<ScriptedTransport>,
        recover: bool,
    ) -> (Pipeline, Arc<RecordingNavigator>, Arc<session_auth::CredentialStore>) {
        let store = signed_in_store("T1", Some("R1")).await;
        let navigator = Arc::new(RecordingNavigator::default());
        let terminator = Arc::new(SessionTerminator::new(
            store.clone(),
            navigator.clone(),
            SessionRoutes::default(),
        ));
        let config = AuthConfig::default();
        let pipeline = Pipeline::new(
            transport,
            RequestInterceptor::new(store.clone()),
            ResponseInterceptor::from_config(&config),
            terminator,
            recover,
        );
        (pipeline, navigator, store)
    }

    #[tokio::test]
    async fn success_passes_through_with_bearer() {
        let transport = ScriptedTransport::new();
        transport.respond("/cuentas/", StatusCode::OK, serde_json::json!([]));
        let (pipeline, _, _) = pipeline(transport.clone(), true).await;

        let response = pipeline.attempt(&ApiRequest::get("/cuentas/")).await.into_final().unwrap();
        assert!(response.is_success());
        assert_eq!(transport.authorizations("/cuentas/"), vec!["Bearer T1"]);
    }

    #[tokio::test]
    async fn non_auth_errors_are_responses_not_errors() {
        let transport = ScriptedTransport::new();
        transport.respond("/cuentas/9/", StatusCode::NOT_FOUND, serde_json::json!({"detail": "No encontrado."}));
        let (pipeline, _, _) = pipeline(transport, true).await;

        let response = pipeline.attempt(&ApiRequest::delete("/cuentas/9/")).await.into_final().unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn first_401_is_handed_back_for_recovery() {
        let transport = ScriptedTransport::new();
        transport.respond("/cuentas/", StatusCode::UNAUTHORIZED, serde_json::json!({}));
        let (pipeline, _, _) = pipeline(transport, true).await;

        match pipeline.attempt(&ApiRequest::get("/cuentas/")).await {
            Attempt::Recoverable { sent_with, .. } => {
                assert_eq!(sent_with.unwrap().expose_str(), "T1");
            }
            other => panic!("expected recoverable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn disabled_recovery_surfaces_expired() {
        let transport = ScriptedTransport::new();
        transport.respond("/cuentas/", StatusCode::UNAUTHORIZED, serde_json::json!({}));
        let (pipeline, _, _) = pipeline(transport, false).await;

        let err = pipeline.attempt(&ApiRequest::get("/cuentas/")).await.into_final().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthorizationExpired);
    }

    #[tokio::test]
    async fn account_removed_clears_and_reloads() {
        let transport = ScriptedTransport::new();
        transport.respond(
            "/cuentas/",
            StatusCode::UNAUTHORIZED,
            serde_json::json!({"detail": "Tu cuenta fue y sus datos eliminados permanentemente."}),
        );
        let (pipeline, navigator, store) = pipeline(transport.clone(), true).await;

        let err = pipeline.attempt(&ApiRequest::get("/cuentas/")).await.into_final().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccountTerminated);
        assert!(!store.is_authenticated());
        assert_eq!(navigator.events(), vec![Nav::Reload("/login".into())]);
        assert_eq!(transport.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn network_failure_passes_straight_through() {
        let transport = ScriptedTransport::new();
        transport.fail("/files/", transport::Error::Connect("connection refused".into()));
        let (pipeline, _, _) = pipeline(transport, true).await;

        let err = pipeline.attempt(&ApiRequest::get("/files/")).await.into_final().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkFailure);
    }
}
