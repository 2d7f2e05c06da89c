//! CLI-specific error types
//!
//! API failures stay as `session_client::Error` and reach `main` through
//! `anyhow`; these cover what the CLI itself validates.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("--{arg} is not valid JSON: {source}")]
    InvalidJson {
        arg: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("not signed in, run `api-cli login` first (redirect: {redirect})")]
    NotSignedIn { redirect: String },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} has no file name, pass --name", path.display())]
    NoFileName { path: PathBuf },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias using CLI Error
pub type Result<T> = std::result::Result<T, Error>;
