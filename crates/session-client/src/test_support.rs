//! In-memory doubles shared by the unit tests

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use session_auth::{CredentialPair, CredentialStore};
use tokio::sync::Notify;
use transport::header::AUTHORIZATION;
use transport::message::normalize_endpoint;
use transport::{
    ApiRequest, ApiResponse, Method, MultipartForm, RequestBody, SendFuture, StatusCode, Transport,
};

use crate::termination::Navigator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Nav {
    Navigate(String),
    Reload(String),
}

#[derive(Debug, Default)]
pub(crate) struct RecordingNavigator {
    events: Mutex<Vec<Nav>>,
}

impl RecordingNavigator {
    pub(crate) fn events(&self) -> Vec<Nav> {
        self.events.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.events.lock().push(Nav::Navigate(route.to_string()));
    }

    fn reload(&self, route: &str) {
        self.events.lock().push(Nav::Reload(route.to_string()));
    }
}

pub(crate) async fn signed_in_store(access: &str, refresh: Option<&str>) -> Arc<CredentialStore> {
    let store = CredentialStore::in_memory();
    store
        .set_tokens(CredentialPair {
            access: access.into(),
            refresh: refresh.map(Into::into),
        })
        .await
        .unwrap();
    Arc::new(store)
}

#[derive(Clone)]
enum Reply {
    Json(StatusCode, serde_json::Value),
    Raw(StatusCode, Bytes),
    /// 200 with the body when the bearer is accepted, 401 otherwise
    Protected(serde_json::Value),
    Fail(transport::Error),
}

/// What the transport saw for one request.
#[derive(Debug, Clone)]
pub(crate) struct Sent {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<RequestBody>,
    pub retried: bool,
    /// Store contents at send time, when a store is being watched
    pub store_access: Option<String>,
    pub store_refresh: Option<String>,
}

const REFRESH_ENDPOINT: &str = "/token/refresh";

/// Scripted `Transport`: answers by normalized path, counts refresh calls,
/// and can hold the refresh call open until released.
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<String, Reply>>,
    accepted: Mutex<Option<String>>,
    refresh_reply: Mutex<Reply>,
    refresh_gate: Mutex<Option<Arc<Notify>>>,
    refresh_calls: AtomicUsize,
    watched: Mutex<Option<Arc<CredentialStore>>>,
    sent: Mutex<Vec<Sent>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            accepted: Mutex::new(None),
            refresh_reply: Mutex::new(Reply::Json(
                StatusCode::UNAUTHORIZED,
                serde_json::json!({"detail": "Token is invalid or expired"}),
            )),
            refresh_gate: Mutex::new(None),
            refresh_calls: AtomicUsize::new(0),
            watched: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn respond(&self, path: &str, status: StatusCode, body: serde_json::Value) {
        self.route(path, Reply::Json(status, body));
    }

    pub(crate) fn respond_bytes(&self, path: &str, status: StatusCode, body: &[u8]) {
        self.route(path, Reply::Raw(status, Bytes::copy_from_slice(body)));
    }

    /// Serve `body` only to requests carrying the accepted access credential.
    pub(crate) fn protect(&self, path: &str, body: serde_json::Value) {
        self.route(path, Reply::Protected(body));
    }

    pub(crate) fn fail(&self, path: &str, error: transport::Error) {
        self.route(path, Reply::Fail(error));
    }

    /// Access credential that protected routes accept.
    pub(crate) fn accept(&self, access: &str) {
        *self.accepted.lock() = Some(access.to_string());
    }

    /// Refresh issues `access` (and rotates to `refresh` when given), which
    /// protected routes accept from then on.
    pub(crate) fn refresh_succeeds(&self, access: &str, refresh: Option<&str>) {
        let body = match refresh {
            Some(refresh) => serde_json::json!({"access": access, "refresh": refresh}),
            None => serde_json::json!({"access": access}),
        };
        *self.refresh_reply.lock() = Reply::Json(StatusCode::OK, body);
    }

    pub(crate) fn refresh_fails(&self, status: StatusCode, body: serde_json::Value) {
        *self.refresh_reply.lock() = Reply::Json(status, body);
    }

    /// Block refresh calls until the returned `Notify` is signalled.
    pub(crate) fn hold_refresh(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.refresh_gate.lock() = Some(gate.clone());
        gate
    }

    /// Record store contents alongside each request.
    pub(crate) fn watch_store(&self, store: Arc<CredentialStore>) {
        *self.watched.lock() = Some(store);
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent
            .lock()
            .iter()
            .filter(|s| normalize_endpoint(&s.path) != REFRESH_ENDPOINT)
            .cloned()
            .collect()
    }

    /// Authorization headers sent to `path`, in order.
    pub(crate) fn authorizations(&self, path: &str) -> Vec<String> {
        let target = normalize_endpoint(path);
        self.sent()
            .into_iter()
            .filter(|s| normalize_endpoint(&s.path) == target)
            .filter_map(|s| s.authorization)
            .collect()
    }

    /// JSON body of the most recent `method` request to `path`.
    pub(crate) fn last_body(&self, method: Method, path: &str) -> Option<serde_json::Value> {
        match self.last_sent(method, path)?.body? {
            RequestBody::Json(value) => Some(value),
            RequestBody::Multipart(_) => None,
        }
    }

    /// Multipart form of the most recent `method` request to `path`.
    pub(crate) fn last_form(&self, method: Method, path: &str) -> Option<MultipartForm> {
        match self.last_sent(method, path)?.body? {
            RequestBody::Multipart(form) => Some(form),
            RequestBody::Json(_) => None,
        }
    }

    fn last_sent(&self, method: Method, path: &str) -> Option<Sent> {
        let target = normalize_endpoint(path);
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|s| s.method == method && normalize_endpoint(&s.path) == target)
            .cloned()
    }

    fn route(&self, path: &str, reply: Reply) {
        self.routes
            .lock()
            .insert(normalize_endpoint(path), reply);
    }

    fn record(&self, request: &ApiRequest) {
        let authorization = request
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let watched = self.watched.lock().clone();
        let (store_access, store_refresh) = match watched {
            Some(store) => (
                store.access().map(|s| s.expose_str().to_string()),
                store.refresh().map(|s| s.expose_str().to_string()),
            ),
            None => (None, None),
        };
        self.sent.lock().push(Sent {
            method: request.method.clone(),
            path: request.path.clone(),
            authorization,
            body: request.body.clone(),
            retried: request.retried,
            store_access,
            store_refresh,
        });
    }

    async fn answer_refresh(&self) -> transport::Result<ApiResponse> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.refresh_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let reply = self.refresh_reply.lock().clone();
        if let Reply::Json(status, body) = &reply
            && status.is_success()
            && let Some(access) = body.get("access").and_then(|a| a.as_str())
        {
            self.accept(access);
        }
        self.render(reply, None)
    }

    fn render(&self, reply: Reply, authorization: Option<&str>) -> transport::Result<ApiResponse> {
        match reply {
            Reply::Json(status, body) => Ok(ApiResponse::with_json(status, &body)),
            Reply::Raw(status, body) => Ok(ApiResponse::new(status, body)),
            Reply::Fail(error) => Err(error),
            Reply::Protected(body) => {
                let accepted = self.accepted.lock().clone();
                let valid = accepted.map(|a| format!("Bearer {a}"));
                if valid.is_some() && authorization == valid.as_deref() {
                    Ok(ApiResponse::with_json(StatusCode::OK, &body))
                } else {
                    Ok(ApiResponse::with_json(
                        StatusCode::UNAUTHORIZED,
                        &serde_json::json!({
                            "detail": "Given token not valid for any token type",
                            "code": "token_not_valid"
                        }),
                    ))
                }
            }
        }
    }
}

impl Transport for ScriptedTransport {
    fn id(&self) -> &str {
        "scripted"
    }

    fn send<'a>(&'a self, request: &'a ApiRequest) -> SendFuture<'a> {
        Box::pin(async move {
            self.record(request);
            let path = request.endpoint_path();
            if path == REFRESH_ENDPOINT {
                return self.answer_refresh().await;
            }
            let reply = self.routes.lock().get(&path).cloned().unwrap_or_else(|| {
                Reply::Json(StatusCode::NOT_FOUND, serde_json::json!({"detail": "Not found."}))
            });
            let authorization = request
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok());
            self.render(reply, authorization)
        })
    }
}
