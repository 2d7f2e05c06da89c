//! Pipeline configuration
//!
//! `AuthConfig` declares which endpoints are exempt from credential recovery
//! and how the server signals a permanently removed account. `SessionRoutes`
//! names the navigation targets used when a session ends. Both deserialize
//! from the `[auth]` / `[session]` TOML sections and default to the API's
//! conventions, so the library works without any file.

use serde::Deserialize;
use session_auth::{
    ACCOUNT_REMOVED_CODE, ACCOUNT_REMOVED_MARKER, LOGIN_PATH, REFRESH_PATH, REGISTER_PATH,
};

/// Library-side view of the `[auth]` and `[session]` sections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub session: SessionRoutes,
}

/// Credential recovery settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Refresh endpoint, relative to the API base URL
    pub refresh_path: String,
    /// Primary authentication endpoint
    pub login_path: String,
    /// Additional endpoints whose 401s are returned as-is, never recovered.
    /// The refresh and login paths are always exempt.
    pub non_recoverable: Vec<String>,
    /// When false, a recoverable 401 surfaces as `AuthorizationExpired`
    pub recover_on_unauthorized: bool,
    /// Values of the error body's `code` field that mean the account is gone
    pub account_removed_codes: Vec<String>,
    /// Legacy `detail` substrings that mean the account is gone
    pub account_removed_markers: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_path: REFRESH_PATH.to_string(),
            login_path: LOGIN_PATH.to_string(),
            non_recoverable: vec![REGISTER_PATH.to_string()],
            recover_on_unauthorized: true,
            account_removed_codes: vec![ACCOUNT_REMOVED_CODE.to_string()],
            account_removed_markers: vec![ACCOUNT_REMOVED_MARKER.to_string()],
        }
    }
}

impl AuthConfig {
    /// Check endpoint paths are absolute.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let paths = [&self.refresh_path, &self.login_path]
            .into_iter()
            .chain(self.non_recoverable.iter());
        for path in paths {
            if !path.starts_with('/') {
                return Err(format!("endpoint path must start with '/', got: {path}"));
            }
        }
        Ok(())
    }
}

/// Navigation targets for session boundaries.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionRoutes {
    /// Destination after an ordinary logout
    pub login_route: String,
    /// Destination after the session ended because refresh failed
    pub session_expired_route: String,
    /// Landing page for authenticated users
    pub home_route: String,
}

impl Default for SessionRoutes {
    fn default() -> Self {
        Self {
            login_route: "/login".to_string(),
            session_expired_route: "/login?reason=session-expired".to_string(),
            home_route: "/dashboard".to_string(),
        }
    }
}
