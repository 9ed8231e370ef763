use async_trait::async_trait;
use reqwest::{multipart, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{Backend, InvoiceFile};
use crate::error::ClientError;

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

#[derive(Serialize)]
struct IngestRequest<'a> {
    doc_id: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct UploadResponse {
    data: Option<UploadedInvoice>,
}

#[derive(Deserialize)]
struct UploadedInvoice {
    invoice_id: Option<Value>,
}

#[derive(Deserialize)]
struct IngestResponse {
    message: Option<String>,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: Option<String>,
}

/// HTTP client for the analytics backend.
#[derive(Clone)]
pub struct AnalyticsClient {
    client: Client,
    base_url: String,
}

impl AnalyticsClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-2xx response into a [`ClientError::Status`], and read a 2xx
    /// body as JSON.
    async fn read_json(response: Response) -> Result<Value, ClientError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "backend returned an error status");
            return Err(status_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Malformed(e.to_string()))
    }
}

/// Build a status error, pulling `detail` out of the body when there is one.
fn status_error(status: StatusCode, body: &str) -> ClientError {
    ClientError::Status {
        status: status.as_u16(),
        detail: serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("detail").and_then(detail_text)),
    }
}

/// FastAPI sends `detail` as a string for raised errors and as a list of
/// objects for validation failures.
fn detail_text(detail: &Value) -> Option<String> {
    match detail {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item.get("msg").and_then(Value::as_str) {
                    Some(msg) => msg.to_string(),
                    None => item.to_string(),
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        Value::Null | Value::String(_) => None,
        other => Some(other.to_string()),
    }
}

/// Extract the invoice id from a successful upload body.
fn parse_upload(body: Value) -> Result<String, ClientError> {
    if let Some(detail) = body.get("detail").and_then(detail_text) {
        return Err(ClientError::Backend(detail));
    }

    let parsed: UploadResponse = serde_json::from_value(body)
        .map_err(|e| ClientError::Malformed(e.to_string()))?;

    let id = parsed
        .data
        .and_then(|d| d.invoice_id)
        .and_then(|id| match id {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    id.ok_or_else(|| {
        ClientError::Backend("the backend did not return an invoice identifier".to_string())
    })
}

#[async_trait]
impl Backend for AnalyticsClient {
    async fn query(&self, question: &str) -> Result<Value, ClientError> {
        let url = self.url("/query");
        debug!(%url, "sending question");

        let response = self
            .client
            .post(&url)
            .json(&QueryRequest { query: question })
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn upload_invoice(&self, file: InvoiceFile) -> Result<String, ClientError> {
        let url = self.url("/upload-invoice");
        debug!(%url, file = %file.file_name, bytes = file.bytes.len(), "uploading invoice");

        let part = multipart::Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.mime_type)
            .map_err(|e| ClientError::Transport(format!("Invalid MIME type: {}", e)))?;
        let form = multipart::Form::new().part("file", part);

        let response = self.client.post(&url).multipart(form).send().await?;
        let body = Self::read_json(response).await?;
        parse_upload(body)
    }

    async fn ingest_rule(&self, doc_id: &str, content: &str) -> Result<String, ClientError> {
        let url = self.url("/ingest");
        debug!(%url, doc_id, "ingesting rule document");

        let response = self
            .client
            .post(&url)
            .json(&IngestRequest { doc_id, content })
            .send()
            .await?;

        let body = Self::read_json(response).await?;
        let parsed: IngestResponse = serde_json::from_value(body)
            .map_err(|e| ClientError::Malformed(e.to_string()))?;
        Ok(parsed
            .message
            .unwrap_or_else(|| format!("Document {} ingested.", doc_id)))
    }

    async fn health(&self) -> Result<String, ClientError> {
        let response = self.client.get(self.url("/")).send().await?;
        let body = Self::read_json(response).await?;
        let parsed: HealthResponse = serde_json::from_value(body)
            .map_err(|e| ClientError::Malformed(e.to_string()))?;
        parsed
            .status
            .ok_or_else(|| ClientError::Backend("the backend did not report a status".to_string()))
    }
}
