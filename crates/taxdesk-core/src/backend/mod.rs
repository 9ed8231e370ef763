//! Access to the invoice and GST analytics backend.

pub mod analytics;
#[cfg(test)]
pub(crate) mod fake;

pub use analytics::AnalyticsClient;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::error::ClientError;

/// The backend operations the client depends on.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Ask a question. Returns the raw response body for interpretation.
    async fn query(&self, question: &str) -> Result<Value, ClientError>;

    /// Send one invoice file for ingestion. Returns the assigned invoice id.
    async fn upload_invoice(&self, file: InvoiceFile) -> Result<String, ClientError>;

    /// Store a GST rule document under `doc_id`. Returns the backend's message.
    async fn ingest_rule(&self, doc_id: &str, content: &str) -> Result<String, ClientError>;

    /// Reachability check. Returns the reported status.
    async fn health(&self) -> Result<String, ClientError>;
}

/// An invoice file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl InvoiceFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("Not a file path: {:?}", path))?
            .to_string();

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| anyhow!("Failed to read {:?}: {}", path, e))?;

        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self::new(file_name, mime_type, bytes))
    }

    /// Whether a path looks like an invoice the backend is likely to accept
    /// (images and PDFs). Advisory only: pickers use it to filter listings.
    pub fn is_accepted_path(path: &Path) -> bool {
        mime_guess::from_path(path).iter().any(|mime| {
            mime.type_() == mime_guess::mime::IMAGE || mime.essence_str() == "application/pdf"
        })
    }
}
