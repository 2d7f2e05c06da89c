//! Token endpoint interactions
//!
//! Handles the two responses that carry credentials:
//! 1. Login (`POST /auth/login/`): always returns `{access, refresh}`
//! 2. Refresh (`POST /token/refresh/`): returns `{access, refresh?}`
//!
//! The refresh call goes straight to the raw `Transport`, never through the
//! interceptor pipeline, so a failing refresh cannot recurse into another
//! refresh.

use std::sync::Arc;

use common::Secret;
use serde::Deserialize;
use tracing::{debug, info, warn};
use transport::{ApiRequest, ApiResponse, Transport};

use crate::constants::REFRESH_PATH;
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};

/// Credentials issued by the token endpoints.
#[derive(Debug, Clone)]
pub struct CredentialPair {
    pub access: Secret<String>,
    /// Present on login, and on refresh when the server rotates it.
    pub refresh: Option<Secret<String>>,
}

/// Wire shape shared by the login and refresh responses.
#[derive(Deserialize)]
struct TokenResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

/// Read a token response body.
///
/// Non-2xx statuses become `Rejected`; bodies without a non-empty `access`
/// field become `MalformedResponse`.
pub fn parse_token_response(response: &ApiResponse) -> Result<CredentialPair> {
    if !response.is_success() {
        return Err(Error::Rejected {
            status: response.status.as_u16(),
            body: response.text(),
        });
    }

    let parsed: TokenResponse = serde_json::from_slice(&response.body)
        .map_err(|e| Error::MalformedResponse(format!("{e}")))?;
    if parsed.access.is_empty() {
        return Err(Error::MalformedResponse("empty access credential".into()));
    }

    Ok(CredentialPair {
        access: Secret::new(parsed.access),
        refresh: parsed.refresh.filter(|r| !r.is_empty()).map(Secret::new),
    })
}

/// The one network call that exchanges a refresh credential for a new
/// access credential.
#[derive(Clone)]
pub struct RefreshTransport {
    transport: Arc<dyn Transport>,
    path: String,
}

impl std::fmt::Debug for RefreshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTransport")
            .field("transport", &self.transport.id())
            .field("path", &self.path)
            .finish()
    }
}

impl RefreshTransport {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_path(transport, REFRESH_PATH)
    }

    pub fn with_path(transport: Arc<dyn Transport>, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Refresh using whatever refresh credential `store` currently holds.
    ///
    /// Fails with `MissingRefreshToken` before touching the network when
    /// the store has none. Does not write the result back to the store.
    pub async fn refresh(&self, store: &CredentialStore) -> Result<CredentialPair> {
        let Some(refresh) = store.refresh() else {
            warn!("refresh requested without a stored refresh credential");
            return Err(Error::MissingRefreshToken);
        };
        self.exchange(&refresh).await
    }

    /// POST the refresh credential to the refresh endpoint.
    pub async fn exchange(&self, refresh: &Secret<String>) -> Result<CredentialPair> {
        let request = ApiRequest::post(self.path.clone())
            .json(serde_json::json!({ "refresh": refresh.expose_str() }));

        debug!(path = %self.path, "requesting credential refresh");
        let response = self.transport.send(&request).await?;
        let pair = parse_token_response(&response)?;
        info!(rotated = pair.refresh.is_some(), "credential refresh succeeded");
        Ok(pair)
    }
}
