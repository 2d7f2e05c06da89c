//! Shared types for the api-cli workspace
//!
//! Holds the configuration/I-O error type used by config loaders and the
//! `Secret` wrapper every credential travels in.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
