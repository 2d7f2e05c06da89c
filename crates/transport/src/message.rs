//! Request and response values exchanged with a `Transport`
//!
//! `ApiRequest` is an owned, cloneable description of one attempt. The
//! pipeline keeps the original around so it can be replayed after a
//! credential refresh; `retried` is the marker that stops a second replay.
//! Bodies stay owned values for the same reason: a multipart form is
//! rebuilt by the transport on every send.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// One outgoing API call, relative to the transport's base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path plus optional query, e.g. `/cuentas/?page=2`
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    /// Set once this request has been replayed after a credential refresh.
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Attach a `multipart/form-data` body.
    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = Some(RequestBody::Multipart(form));
        self
    }

    /// The JSON body, if this request carries one.
    pub fn json_body(&self) -> Option<&serde_json::Value> {
        match &self.body {
            Some(RequestBody::Json(value)) => Some(value),
            _ => None,
        }
    }

    /// Add or replace a header.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidRequest(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidRequest(format!("invalid header value for '{name}': {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Copy of this request carrying the retry marker.
    pub fn as_replay(&self) -> Self {
        let mut replay = self.clone();
        replay.retried = true;
        replay
    }

    /// Path used for endpoint classification: query and fragment removed,
    /// leading slash enforced, trailing slash dropped (root stays `/`).
    pub fn endpoint_path(&self) -> String {
        normalize_endpoint(&self.path)
    }
}

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Multipart(MultipartForm),
}

/// `multipart/form-data` fields, held as owned bytes until send time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    /// Set for file parts
    pub filename: Option<String>,
    pub data: Bytes,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            filename: None,
            data: Bytes::from(value.into()),
        });
        self
    }

    /// Add a file field.
    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            filename: Some(filename.into()),
            data: data.into(),
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Build the reqwest form. Called once per transmission.
    pub(crate) fn to_reqwest(&self) -> reqwest::multipart::Form {
        self.parts.iter().fold(reqwest::multipart::Form::new(), |form, part| {
            let mut field = reqwest::multipart::Part::bytes(part.data.to_vec());
            if let Some(filename) = &part.filename {
                field = field.file_name(filename.clone());
            }
            form.part(part.name.clone(), field)
        })
    }
}

/// Normalize a path for exact endpoint comparison.
pub fn normalize_endpoint(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_matches('/');
    format!("/{trimmed}")
}

/// A completed HTTP exchange. Any status code is represented here.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Build a response with a JSON body.
    pub fn with_json(status: StatusCode, body: &serde_json::Value) -> Self {
        let mut response = Self::new(status, body.to_string());
        response.headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body decoded as UTF-8, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::Body(format!("invalid JSON body ({}): {e}", self.status)))
    }

    /// Body as a JSON value, or `None` when it isn't JSON.
    pub fn json_value(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_path_strips_query_and_trailing_slash() {
        assert_eq!(ApiRequest::get("/token/refresh/").endpoint_path(), "/token/refresh");
        assert_eq!(ApiRequest::get("token/refresh").endpoint_path(), "/token/refresh");
        assert_eq!(ApiRequest::get("/cuentas/?page=2").endpoint_path(), "/cuentas");
        assert_eq!(ApiRequest::get("/files/7/#top").endpoint_path(), "/files/7");
        assert_eq!(ApiRequest::get("/").endpoint_path(), "/");
        assert_eq!(ApiRequest::get("").endpoint_path(), "/");
    }

    #[test]
    fn endpoint_path_does_not_match_by_substring() {
        // A resource merely containing "login" must not normalize onto the login path
        assert_ne!(
            ApiRequest::get("/reports/login-history/").endpoint_path(),
            normalize_endpoint("/auth/login/")
        );
    }

    #[test]
    fn as_replay_sets_marker_and_keeps_request() {
        let original = ApiRequest::put("/cuentas/3/")
            .json(serde_json::json!({"nombre": "Ahorro"}))
            .header("x-trace", "abc")
            .unwrap();
        let replay = original.as_replay();

        assert!(!original.retried);
        assert!(replay.retried);
        assert_eq!(replay.method, Method::PUT);
        assert_eq!(replay.path, "/cuentas/3/");
        assert_eq!(replay.body, original.body);
        assert_eq!(replay.headers.get("x-trace").unwrap(), "abc");
    }

    #[test]
    fn multipart_replay_keeps_every_part() {
        let form = MultipartForm::new()
            .text("descripcion", "Estado de cuenta")
            .file("file", "informe.pdf", &b"%PDF-1.7"[..]);
        let original = ApiRequest::post("/files/").multipart(form);
        let replay = original.as_replay();

        assert_eq!(replay.body, original.body);
        assert!(replay.json_body().is_none());
        let Some(RequestBody::Multipart(form)) = &replay.body else {
            panic!("expected a multipart body, got {:?}", replay.body);
        };
        assert_eq!(form.parts().len(), 2);
        assert_eq!(form.parts()[0].filename, None);
        assert_eq!(form.parts()[1].filename.as_deref(), Some("informe.pdf"));
        assert_eq!(&form.parts()[1].data[..], b"%PDF-1.7");
    }

    #[test]
    fn header_rejects_injection() {
        let result = ApiRequest::get("/files/").header("x-bad", "value\r\ninjected: 1");
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn response_json_helpers() {
        let response = ApiResponse::with_json(
            StatusCode::UNAUTHORIZED,
            &serde_json::json!({"detail": "Token expirado"}),
        );
        assert!(!response.is_success());
        assert_eq!(response.json_value().unwrap()["detail"], "Token expirado");
        assert_eq!(
            response.headers.get(reqwest::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let plain = ApiResponse::new(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(plain.json_value().is_none());
        assert!(plain.json::<serde_json::Value>().is_err());
        assert_eq!(plain.text(), "upstream down");
    }
}
