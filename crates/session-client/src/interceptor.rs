//! Request and response interceptors
//!
//! The request side attaches the current access credential just before
//! transmission. The response side classifies every completed exchange into
//! a `Disposition` that the pipeline acts on:
//!
//! - `PassThrough`: anything that is not a 401, or a 401 from an endpoint
//!   declared non-recoverable
//! - `RecoverableOnce`: 401 on an eligible request without the retry marker
//! - `Terminal`: 401 on a request that was already replayed once
//! - `AccountRemoved`: the error body says the account no longer exists.
//!   Checked before everything else.

use std::collections::HashSet;
use std::sync::Arc;

use common::Secret;
use session_auth::{BEARER_PREFIX, CredentialStore};
use transport::header::{AUTHORIZATION, HeaderValue};
use transport::message::normalize_endpoint;
use transport::{ApiRequest, ApiResponse, StatusCode};

use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// Attaches `Authorization: Bearer <access>` from the credential store.
#[derive(Debug, Clone)]
pub struct RequestInterceptor {
    store: Arc<CredentialStore>,
}

impl RequestInterceptor {
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self { store }
    }

    /// Copy of `request` carrying the current access credential.
    ///
    /// Returns the credential that was attached (if any) alongside, so a later
    /// 401 can be matched against the value that was actually sent. Without a
    /// stored credential the request passes through unmodified.
    pub fn apply(&self, request: &ApiRequest) -> Result<(ApiRequest, Option<Secret<String>>)> {
        let mut prepared = request.clone();
        let Some(access) = self.store.access() else {
            return Ok((prepared, None));
        };
        let value = HeaderValue::from_str(&format!("{BEARER_PREFIX}{}", access.expose_str()))
            .map_err(|e| Error::InvalidRequest(format!("access credential is not a valid header value: {e}")))?;
        prepared.headers.insert(AUTHORIZATION, value);
        Ok((prepared, Some(access)))
    }
}

/// Declared set of endpoints whose authorization failures are never
/// recovered. Matching is on the normalized path, not a substring.
#[derive(Debug, Clone)]
pub struct EndpointPolicy {
    exempt: HashSet<String>,
}

impl EndpointPolicy {
    /// The refresh and login endpoints are always exempt.
    pub fn new<I, S>(refresh_path: &str, login_path: &str, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exempt: HashSet<String> = extra
            .into_iter()
            .map(|p| normalize_endpoint(p.as_ref()))
            .collect();
        exempt.insert(normalize_endpoint(refresh_path));
        exempt.insert(normalize_endpoint(login_path));
        Self { exempt }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.refresh_path,
            &config.login_path,
            &config.non_recoverable,
        )
    }

    pub fn is_recoverable(&self, request: &ApiRequest) -> bool {
        !self.exempt.contains(&request.endpoint_path())
    }
}

/// Recognises the server's "account permanently removed" signal.
///
/// The structured `code` field is checked first; the `detail` substring
/// match is kept for servers that only send the legacy message.
#[derive(Debug, Clone, Default)]
pub struct AccountRemovalDetector {
    codes: Vec<String>,
    markers: Vec<String>,
}

impl AccountRemovalDetector {
    pub fn new(codes: Vec<String>, markers: Vec<String>) -> Self {
        Self {
            codes,
            markers: markers.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.account_removed_codes.clone(),
            config.account_removed_markers.clone(),
        )
    }

    /// Detail message when `response` signals account removal.
    pub fn detect(&self, response: &ApiResponse) -> Option<String> {
        if response.is_success() {
            return None;
        }
        self.detect_body(&response.json_value()?)
    }

    /// Same check against an error body already read as text, such as the
    /// body of a rejected refresh.
    pub fn detect_text(&self, body: &str) -> Option<String> {
        let body: serde_json::Value = serde_json::from_str(body).ok()?;
        self.detect_body(&body)
    }

    fn detect_body(&self, body: &serde_json::Value) -> Option<String> {
        let detail = body
            .get("detail")
            .and_then(|d| d.as_str())
            .map(str::to_string);

        if let Some(code) = body.get("code").and_then(|c| c.as_str())
            && self.codes.iter().any(|c| c == code)
        {
            return Some(detail.unwrap_or_else(|| code.to_string()));
        }

        let detail = detail?;
        let lower = detail.to_lowercase();
        self.markers
            .iter()
            .any(|marker| lower.contains(marker.as_str()))
            .then_some(detail)
    }
}

/// What the pipeline should do with a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    PassThrough,
    RecoverableOnce,
    Terminal,
    AccountRemoved { detail: String },
}

/// Classifies completed responses.
#[derive(Debug, Clone)]
pub struct ResponseInterceptor {
    policy: EndpointPolicy,
    detector: AccountRemovalDetector,
}

impl ResponseInterceptor {
    pub fn new(policy: EndpointPolicy, detector: AccountRemovalDetector) -> Self {
        Self { policy, detector }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            EndpointPolicy::from_config(config),
            AccountRemovalDetector::from_config(config),
        )
    }

    pub fn detector(&self) -> &AccountRemovalDetector {
        &self.detector
    }

    /// Classify `response`, produced by `request` (the request as the caller
    /// built it, carrying its retry marker).
    pub fn classify(&self, request: &ApiRequest, response: &ApiResponse) -> Disposition {
        if let Some(detail) = self.detector.detect(response) {
            return Disposition::AccountRemoved { detail };
        }
        if response.status != StatusCode::UNAUTHORIZED || !self.policy.is_recoverable(request) {
            return Disposition::PassThrough;
        }
        if request.retried {
            Disposition::Terminal
        } else {
            Disposition::RecoverableOnce
        }
    }
}
