//! API endpoint and storage constants
//!
//! Endpoint paths are relative to the configured API base URL. Storage keys
//! name the two values kept in the session-scoped key/value store.

/// Refresh endpoint: exchanges `{refresh}` for `{access, refresh?}`
pub const REFRESH_PATH: &str = "/token/refresh/";

/// Primary authentication endpoint
pub const LOGIN_PATH: &str = "/auth/login/";

/// Account registration endpoint
pub const REGISTER_PATH: &str = "/auth/register/";

/// Current user's profile
pub const PROFILE_PATH: &str = "/profile/me/";

/// Storage key for the access credential
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key for the refresh credential
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Authorization scheme prefix for protected requests
pub const BEARER_PREFIX: &str = "Bearer ";

/// Structured error `code` the server sends for a permanently removed account
pub const ACCOUNT_REMOVED_CODE: &str = "account_removed";

/// Legacy `detail` substring signalling a permanently removed account
pub const ACCOUNT_REMOVED_MARKER: &str = "eliminados permanentemente";
