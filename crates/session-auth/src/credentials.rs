//! Session-scoped credential storage
//!
//! Holds the current access/refresh pair for one client instance. Reads are
//! synchronous (`parking_lot::Mutex`, never held across an await) so the
//! request interceptor can attach the access credential without suspending.
//!
//! When a file path is configured, every mutation is persisted as a JSON
//! object keyed `access_token` / `refresh_token`, written atomically via temp
//! file + rename. A tokio Mutex serializes those writes; each write snapshots
//! the in-memory state after acquiring it, so the file always ends on the
//! latest values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use common::Secret;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::error::{Error, Result};
use crate::token::CredentialPair;

#[derive(Default)]
struct Slots {
    access: Option<Secret<String>>,
    refresh: Option<Secret<String>>,
    /// Bumped on every clear; a pair obtained before the bump is stale.
    generation: u64,
}

/// Credential holder for one session.
pub struct CredentialStore {
    path: Option<PathBuf>,
    state: Mutex<Slots>,
    write_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CredentialStore")
            .field("path", &self.path)
            .field("has_access", &state.access.is_some())
            .field("has_refresh", &state.refresh.is_some())
            .finish()
    }
}

impl CredentialStore {
    /// Store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(Slots::default()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Load credentials from the given file path.
    ///
    /// A missing file is a cold start: the store begins empty and the file is
    /// created on the first write.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| Error::Io(format!("checking credential file: {e}")))?;
        let slots = if exists {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let values: BTreeMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            let slots = Slots {
                access: values.get(ACCESS_TOKEN_KEY).cloned().map(Secret::new),
                refresh: values.get(REFRESH_TOKEN_KEY).cloned().map(Secret::new),
                generation: 0,
            };
            info!(
                path = %path.display(),
                has_access = slots.access.is_some(),
                has_refresh = slots.refresh.is_some(),
                "loaded session credentials"
            );
            slots
        } else {
            info!(path = %path.display(), "credential file not found, starting signed out");
            Slots::default()
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(slots),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Current access credential.
    pub fn access(&self) -> Option<Secret<String>> {
        self.state.lock().access.clone()
    }

    /// Current refresh credential.
    pub fn refresh(&self) -> Option<Secret<String>> {
        self.state.lock().refresh.clone()
    }

    /// Whether an access credential is present.
    pub fn is_authenticated(&self) -> bool {
        self.state.lock().access.is_some()
    }

    /// Session generation. Changes whenever the store is cleared.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Replace the access credential, and the refresh credential if the
    /// server rotated it. In-memory values change before the first await;
    /// the returned future completes once the file is written.
    pub async fn set_tokens(&self, pair: CredentialPair) -> Result<()> {
        Self::apply(&mut self.state.lock(), pair);
        debug!("updated session credentials");
        self.persist().await
    }

    /// Like `set_tokens`, but only while the store is still in `generation`.
    ///
    /// Returns `Ok(false)` and leaves the store untouched when it was cleared
    /// after `generation` was read. The check and the write happen under one
    /// lock.
    pub async fn set_tokens_if_current(
        &self,
        generation: u64,
        pair: CredentialPair,
    ) -> Result<bool> {
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!(
                    expected = generation,
                    current = state.generation,
                    "session cleared since refresh started, discarding credentials"
                );
                return Ok(false);
            }
            Self::apply(&mut state, pair);
        }
        debug!("updated session credentials");
        self.persist().await?;
        Ok(true)
    }

    fn apply(state: &mut Slots, pair: CredentialPair) {
        state.access = Some(pair.access);
        if let Some(refresh) = pair.refresh {
            state.refresh = Some(refresh);
        }
    }

    /// Drop both credentials. Memory is cleared synchronously; the file (if
    /// any) is rewritten afterwards.
    pub async fn clear(&self) -> Result<()> {
        if self.clear_now() {
            debug!("cleared session credentials");
        }
        self.persist().await
    }

    /// Clear in-memory credentials without touching the file, and start a new
    /// generation.
    ///
    /// Returns whether anything was stored.
    pub fn clear_now(&self) -> bool {
        let mut state = self.state.lock();
        let had_any = state.access.is_some() || state.refresh.is_some();
        state.access = None;
        state.refresh = None;
        state.generation += 1;
        had_any
    }

    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        let values = {
            let state = self.state.lock();
            let mut values = BTreeMap::new();
            if let Some(access) = &state.access {
                values.insert(ACCESS_TOKEN_KEY, access.expose_str().to_string());
            }
            if let Some(refresh) = &state.refresh {
                values.insert(REFRESH_TOKEN_KEY, refresh.expose_str().to_string());
            }
            values
        };
        write_atomic(path, &values).await
    }
}

/// Write the credential map to a file atomically.
///
/// Writes a temporary file in the same directory, then renames it over the
/// target. Permissions are 0600 since the file contains bearer tokens.
async fn write_atomic(path: &Path, values: &BTreeMap<&str, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(values)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::Io(format!("creating credential directory: {e}")))?;

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
