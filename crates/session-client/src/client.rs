//! Authenticated API client
//!
//! Entry point for every protected call. Each request gets a `req_` id and
//! a tracing span, goes through the pipeline once, and on a recoverable 401
//! waits for the refresh coordinator's outcome.

use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use session_auth::{CredentialStore, RefreshTransport};
use tracing::{debug, instrument};
use transport::{ApiRequest, ApiResponse, MultipartForm, Transport};

use crate::config::ClientConfig;
use crate::coordinator::RefreshCoordinator;
use crate::error::{Error, Result};
use crate::interceptor::{RequestInterceptor, ResponseInterceptor};
use crate::pipeline::{Attempt, Pipeline};
use crate::termination::{Navigator, SessionTerminator};

/// Cheap to clone; clones share the store, coordinator and terminator.
#[derive(Clone)]
pub struct ApiClient {
    pipeline: Arc<Pipeline>,
    coordinator: Arc<RefreshCoordinator>,
    store: Arc<CredentialStore>,
    terminator: Arc<SessionTerminator>,
    config: Arc<ClientConfig>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("transport", &self.pipeline.transport().id())
            .field("store", &self.store)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

impl ApiClient {
    /// Assemble the pipeline around `transport`.
    ///
    /// `config` is expected to be validated already (see
    /// `AuthConfig::validate`).
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        navigator: Arc<dyn Navigator>,
        config: ClientConfig,
    ) -> Self {
        let terminator = Arc::new(SessionTerminator::new(
            store.clone(),
            navigator,
            config.session.clone(),
        ));
        let pipeline = Arc::new(Pipeline::new(
            transport.clone(),
            RequestInterceptor::new(store.clone()),
            ResponseInterceptor::from_config(&config.auth),
            terminator.clone(),
            config.auth.recover_on_unauthorized,
        ));
        let refresher = RefreshTransport::with_path(transport, config.auth.refresh_path.clone());
        let coordinator = Arc::new(RefreshCoordinator::new(
            pipeline.clone(),
            refresher,
            store.clone(),
            terminator.clone(),
        ));

        Self {
            pipeline,
            coordinator,
            store,
            terminator,
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn terminator(&self) -> &Arc<SessionTerminator> {
        &self.terminator
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    /// Send a request through the interceptor chain.
    ///
    /// Every HTTP status comes back as `Ok` except authorization failures
    /// the pipeline could not recover and account removal.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        self.dispatch(request, request_id).await
    }

    #[instrument(skip_all, fields(request_id = %request_id, method = %request.method, path = %request.path))]
    async fn dispatch(&self, request: ApiRequest, request_id: String) -> Result<ApiResponse> {
        match self.pipeline.attempt(&request).await {
            Attempt::Complete(result) => result,
            Attempt::Recoverable { response, sent_with } => {
                debug!(
                    status = response.status.as_u16(),
                    "authorization expired, deferring to refresh coordinator"
                );
                self.coordinator.recover(request, sent_with, request_id).await
            }
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: &str, body: serde_json::Value) -> Result<ApiResponse> {
        self.send(ApiRequest::post(path).json(body)).await
    }

    /// POST a `multipart/form-data` body. Recovered like any other request.
    pub async fn post_form(&self, path: &str, form: MultipartForm) -> Result<ApiResponse> {
        self.send(ApiRequest::post(path).multipart(form)).await
    }

    pub async fn put(&self, path: &str, body: serde_json::Value) -> Result<ApiResponse> {
        self.send(ApiRequest::put(path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(ApiRequest::delete(path)).await
    }

    /// GET and deserialize a 2xx JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = expect_success(self.get(path).await?)?;
        decode(&response)
    }

    /// GET a 2xx body as raw bytes.
    pub async fn get_bytes(&self, path: &str) -> Result<Bytes> {
        Ok(expect_success(self.get(path).await?)?.body)
    }
}

/// Turn a non-2xx response into `Error::Status`.
pub fn expect_success(response: ApiResponse) -> Result<ApiResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(Error::Status {
            status: response.status.as_u16(),
            body: response.text(),
        })
    }
}

pub(crate) fn decode<T: DeserializeOwned>(response: &ApiResponse) -> Result<T> {
    response
        .json()
        .map_err(|e| Error::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::{RecordingNavigator, ScriptedTransport, signed_in_store};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use transport::{ReqwestTransport, StatusCode};

    #[tokio::test]
    async fn expect_success_maps_status() {
        let err = expect_success(ApiResponse::new(StatusCode::BAD_REQUEST, "{\"nombre\":[\"requerido\"]}"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HttpStatus);
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("requerido"));
    }

    #[tokio::test]
    async fn get_json_rejects_unexpected_shape() {
        let transport = ScriptedTransport::new();
        transport.respond("/profile/me/", StatusCode::OK, serde_json::json!("not an object"));
        let store = signed_in_store("T1", Some("R1")).await;
        let client = ApiClient::new(
            transport,
            store,
            Arc::new(RecordingNavigator::default()),
            ClientConfig::default(),
        );

        let err = client
            .get_json::<serde_json::Map<String, serde_json::Value>>("/profile/me/")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    }

    /// Upstream that accepts only `Bearer T2`, issues T2 on refresh, and
    /// counts refresh hits.
    async fn start_upstream(refresh_hits: Arc<AtomicUsize>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new()
            .route(
                "/api/token/refresh/",
                post(move |Json(body): Json<serde_json::Value>| {
                    let refresh_hits = refresh_hits.clone();
                    async move {
                        refresh_hits.fetch_add(1, Ordering::SeqCst);
                        // Widen the window in which other requests fail with T1
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        if body["refresh"] == "R1" {
                            (AxumStatus::OK, Json(serde_json::json!({"access": "T2", "refresh": "R2"})))
                        } else {
                            (
                                AxumStatus::UNAUTHORIZED,
                                Json(serde_json::json!({"detail": "Token is invalid or expired"})),
                            )
                        }
                    }
                }),
            )
            .route(
                "/api/cuentas/",
                get(|headers: HeaderMap| async move {
                    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                        Some("Bearer T2") => (AxumStatus::OK, Json(serde_json::json!([{"id": 1}]))),
                        _ => (
                            AxumStatus::UNAUTHORIZED,
                            Json(serde_json::json!({
                                "detail": "Given token not valid for any token type",
                                "code": "token_not_valid"
                            })),
                        ),
                    }
                }),
            );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    #[tokio::test]
    async fn concurrent_requests_over_http_share_one_refresh() {
        let refresh_hits = Arc::new(AtomicUsize::new(0));
        let url = start_upstream(refresh_hits.clone()).await;
        let transport = Arc::new(ReqwestTransport::new(&url, Duration::from_secs(5)).unwrap());
        let store = signed_in_store("T1", Some("R1")).await;
        let client = ApiClient::new(
            transport,
            store.clone(),
            Arc::new(RecordingNavigator::default()),
            ClientConfig::default(),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.get_json::<serde_json::Value>("/cuentas/").await })
            })
            .collect();
        for h in handles {
            let accounts = h.await.unwrap().unwrap();
            assert_eq!(accounts[0]["id"], 1);
        }

        assert_eq!(refresh_hits.load(Ordering::SeqCst), 1);
        assert_eq!(store.access().unwrap().expose_str(), "T2");
        assert_eq!(store.refresh().unwrap().expose_str(), "R2");
    }

    #[tokio::test]
    async fn rejected_refresh_over_http_ends_session() {
        let refresh_hits = Arc::new(AtomicUsize::new(0));
        let url = start_upstream(refresh_hits.clone()).await;
        let transport = Arc::new(ReqwestTransport::new(&url, Duration::from_secs(5)).unwrap());
        let store = signed_in_store("T1", Some("revoked")).await;
        let navigator = Arc::new(RecordingNavigator::default());
        let client = ApiClient::new(transport, store.clone(), navigator.clone(), ClientConfig::default());

        let err = client.get("/cuentas/").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RefreshFailure);
        assert!(err.ends_session());
        assert_eq!(refresh_hits.load(Ordering::SeqCst), 1);
        assert!(!store.is_authenticated());
        assert_eq!(navigator.events().len(), 1);
    }
}
