//! reqwest-backed transport, the production wire layer.
//!
//! Joins the request path onto a fixed base URL, forwards headers and the
//! body verbatim (JSON, or a freshly built multipart form), and returns
//! whatever status the server produced.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use crate::error::{Error, Result};
use crate::message::{ApiRequest, ApiResponse, RequestBody};
use crate::{SendFuture, Transport};

/// Transport over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Create a transport rooted at `base_url` (e.g. `https://host/api`).
    ///
    /// Rejects anything that is not an http(s) URL. Every request gets
    /// `Content-Type: application/json` unless it sets its own; multipart
    /// bodies set their boundary type.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let url = reqwest::Url::parse(base_url)
            .map_err(|e| Error::InvalidUrl(format!("'{base_url}': {e}")))?;
        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(Error::InvalidUrl(format!(
                    "unsupported scheme '{scheme}' in '{base_url}'"
                )));
            }
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidRequest(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a request path.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request.path);
        debug!(method = %request.method, url = %url, retried = request.retried, "sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        builder = match &request.body {
            Some(RequestBody::Json(body)) => builder.body(body.to_string()),
            Some(RequestBody::Multipart(form)) => builder.multipart(form.to_reqwest()),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!(status = status.as_u16(), bytes = body.len(), "response received");
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for ReqwestTransport {
    fn id(&self) -> &str {
        "reqwest"
    }

    fn send<'a>(&'a self, request: &'a ApiRequest) -> SendFuture<'a> {
        Box::pin(self.execute(request))
    }
}
