//! Signed-in user session
//!
//! Login, registration and profile loading on top of `ApiClient`. Login and
//! register go through the same pipeline as everything else; their 401s are
//! never recovered because both endpoints are declared non-recoverable.

use parking_lot::Mutex;
use serde::Serialize;
use session_auth::{PROFILE_PATH, REGISTER_PATH, parse_token_response};
use tracing::{info, warn};
use transport::ApiRequest;

use crate::client::{ApiClient, decode, expect_success};
use crate::error::{Error, Result};

/// Username/password pair posted to the login endpoint.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug)]
pub struct AuthSession {
    client: ApiClient,
    user: Mutex<Option<serde_json::Value>>,
}

impl AuthSession {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            user: Mutex::new(None),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Profile loaded by the last successful `fetch_profile()`.
    pub fn user(&self) -> Option<serde_json::Value> {
        self.user.lock().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.is_authenticated()
    }

    /// Exchange credentials for a token pair, then load the profile.
    ///
    /// The token pair is stored before the profile request. A failed
    /// profile fetch is returned as an error but keeps the new session.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<serde_json::Value> {
        let body = serde_json::to_value(credentials)
            .map_err(|e| Error::InvalidRequest(format!("encoding credentials: {e}")))?;
        let login_path = self.client.config().auth.login_path.clone();
        let response = self.client.send(ApiRequest::post(login_path).json(body)).await?;

        let pair = parse_token_response(&response).map_err(|e| match e {
            session_auth::Error::Rejected { status, body } => Error::Status { status, body },
            other => Error::InvalidResponse(other.to_string()),
        })?;
        self.client
            .store()
            .set_tokens(pair)
            .await
            .map_err(Error::Credentials)?;
        self.client.terminator().rearm();
        info!(username = %credentials.username, "signed in");

        self.fetch_profile().await
    }

    /// Create an account. Does not sign in.
    pub async fn register(&self, user: serde_json::Value) -> Result<serde_json::Value> {
        let response = expect_success(self.client.post(REGISTER_PATH, user).await?)?;
        info!("registration accepted");
        decode(&response)
    }

    /// Load and cache the current user's profile.
    pub async fn fetch_profile(&self) -> Result<serde_json::Value> {
        if !self.client.is_authenticated() {
            return Err(Error::InvalidRequest("not signed in".into()));
        }
        match self.client.get_json::<serde_json::Value>(PROFILE_PATH).await {
            Ok(profile) => {
                *self.user.lock() = Some(profile.clone());
                Ok(profile)
            }
            Err(e) => {
                warn!(error = %e, "failed to load profile");
                Err(e)
            }
        }
    }

    /// Forget the user and credentials, then navigate to the login route.
    pub async fn logout(&self) {
        self.user.lock().take();
        self.client.terminator().logout().await;
    }
}
