//! Resource services built on `ApiClient`
//!
//! Thin wrappers: each call goes through the full pipeline, so credential
//! recovery is transparent to them.

use bytes::Bytes;
use serde_json::Value;
use tracing::debug;
use transport::MultipartForm;

use crate::client::{ApiClient, decode, expect_success};
use crate::error::{Error, Result};

const ACCOUNTS_PATH: &str = "/cuentas/";
const FILES_PATH: &str = "/files/";
const ANNOUNCEMENTS_PATH: &str = "/anuncios/";
/// Form field the upload endpoint reads the file from.
const UPLOAD_FIELD: &str = "file";

/// `/cuentas/` CRUD.
#[derive(Debug, Clone)]
pub struct Accounts {
    client: ApiClient,
}

impl Accounts {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Value> {
        self.client.get_json(ACCOUNTS_PATH).await
    }

    pub async fn create(&self, account: Value) -> Result<Value> {
        let response = expect_success(self.client.post(ACCOUNTS_PATH, account).await?)?;
        decode(&response)
    }

    pub async fn update(&self, id: &str, account: Value) -> Result<Value> {
        let response =
            expect_success(self.client.put(&format!("{ACCOUNTS_PATH}{id}/"), account).await?)?;
        decode(&response)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        expect_success(self.client.delete(&format!("{ACCOUNTS_PATH}{id}/")).await?)?;
        Ok(())
    }
}

/// `/files/` listing, download and removal.
#[derive(Debug, Clone)]
pub struct Files {
    client: ApiClient,
}

impl Files {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Value> {
        self.client.get_json(FILES_PATH).await
    }

    /// Upload `data` as `filename`. Returns the created file record.
    pub async fn upload(&self, filename: &str, data: impl Into<Bytes>) -> Result<Value> {
        let data = data.into();
        let size = data.len();
        let form = MultipartForm::new().file(UPLOAD_FIELD, filename, data);
        let response = expect_success(self.client.post_form(FILES_PATH, form).await?)?;
        debug!(filename, bytes = size, "uploaded file");
        decode(&response)
    }

    /// Raw file contents.
    pub async fn download(&self, id: &str) -> Result<Bytes> {
        let body = self
            .client
            .get_bytes(&format!("{FILES_PATH}{id}/download/"))
            .await?;
        debug!(id, bytes = body.len(), "downloaded file");
        Ok(body)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        expect_success(self.client.delete(&format!("{FILES_PATH}{id}/")).await?)?;
        Ok(())
    }
}

/// `/anuncios/` feed.
#[derive(Debug, Clone)]
pub struct Announcements {
    client: ApiClient,
}

impl Announcements {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Announcements as a flat list.
    ///
    /// Accepts a bare array or a paginated `{"results": [...]}` envelope;
    /// any other body shape yields an empty list. Requires a signed-in
    /// session.
    pub async fn list(&self) -> Result<Vec<Value>> {
        if !self.client.is_authenticated() {
            return Err(Error::InvalidRequest("not signed in".into()));
        }
        let body: Value = self.client.get_json(ANNOUNCEMENTS_PATH).await?;
        Ok(flatten_announcements(body))
    }
}

fn flatten_announcements(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut envelope) => match envelope.remove("results") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
