//! Invoice upload and rule ingestion lifecycle.
//!
//! One transfer at a time: the controller is either [`UploadPhase::Idle`] or
//! [`UploadPhase::Uploading`], independently of whether a question is in
//! flight. Every transfer that starts logs exactly one message when it ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{Backend, InvoiceFile};
use crate::error::ClientError;
use crate::state::Message;
use crate::store::ConversationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Uploading,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// No file selected (or nothing to ingest); nothing was sent or logged.
    Ignored,
    /// A transfer is already running; nothing was sent or logged.
    Busy,
    /// Accepted. Carries the invoice id, or the backend's message for rules.
    Stored(String),
    Failed,
}

#[derive(Clone)]
pub struct UploadController {
    backend: Arc<dyn Backend>,
    store: Arc<ConversationStore>,
    uploading: Arc<AtomicBool>,
}

impl UploadController {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<ConversationStore>) -> Self {
        Self {
            backend,
            store,
            uploading: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn phase(&self) -> UploadPhase {
        if self.uploading.load(Ordering::SeqCst) {
            UploadPhase::Uploading
        } else {
            UploadPhase::Idle
        }
    }

    /// Upload an invoice and wait for the outcome to be logged.
    pub async fn upload_invoice(&self, file: Option<InvoiceFile>) -> UploadOutcome {
        match self.begin_invoice(file) {
            Ok(pending) => pending.run().await,
            Err(outcome) => outcome,
        }
    }

    /// Send a GST rule document and wait for the outcome to be logged.
    pub async fn ingest_rule(&self, doc_id: &str, content: &str) -> UploadOutcome {
        match self.begin_rule(doc_id, content) {
            Ok(pending) => pending.run().await,
            Err(outcome) => outcome,
        }
    }

    /// Claim the upload slot for `file`. `None` is a cancelled selection.
    pub fn begin_invoice(&self, file: Option<InvoiceFile>) -> Result<PendingUpload, UploadOutcome> {
        let Some(file) = file else {
            return Err(UploadOutcome::Ignored);
        };
        self.claim(Transfer::Invoice(file))
    }

    pub fn begin_rule(&self, doc_id: &str, content: &str) -> Result<PendingUpload, UploadOutcome> {
        let doc_id = doc_id.trim();
        if doc_id.is_empty() || content.trim().is_empty() {
            return Err(UploadOutcome::Ignored);
        }
        self.claim(Transfer::Rule {
            doc_id: doc_id.to_string(),
            content: content.to_string(),
        })
    }

    fn claim(&self, transfer: Transfer) -> Result<PendingUpload, UploadOutcome> {
        if self
            .uploading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("upload rejected, another transfer is running");
            return Err(UploadOutcome::Busy);
        }

        Ok(PendingUpload {
            backend: self.backend.clone(),
            store: self.store.clone(),
            transfer,
            _guard: PhaseGuard(self.uploading.clone()),
        })
    }
}

enum Transfer {
    Invoice(InvoiceFile),
    Rule { doc_id: String, content: String },
}

/// Returns the controller to `Idle` however the transfer ends.
struct PhaseGuard(Arc<AtomicBool>);

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A transfer holding the upload slot, waiting to be sent.
pub struct PendingUpload {
    backend: Arc<dyn Backend>,
    store: Arc<ConversationStore>,
    transfer: Transfer,
    _guard: PhaseGuard,
}

impl PendingUpload {
    /// Name shown while the transfer runs.
    pub fn label(&self) -> &str {
        match &self.transfer {
            Transfer::Invoice(file) => &file.file_name,
            Transfer::Rule { doc_id, .. } => doc_id,
        }
    }

    /// Perform the transfer and log exactly one notice or error message.
    pub async fn run(self) -> UploadOutcome {
        match self.transfer {
            Transfer::Invoice(file) => {
                info!(file = %file.file_name, "uploading invoice");
                match self.backend.upload_invoice(file).await {
                    Ok(invoice_id) => {
                        info!(%invoice_id, "invoice stored");
                        self.store.append(Message::system_notice(format!(
                            "Successfully uploaded invoice: {}",
                            invoice_id
                        )));
                        UploadOutcome::Stored(invoice_id)
                    }
                    Err(e) => {
                        warn!(error = %e, "invoice upload failed");
                        self.store
                            .append(Message::error(format!("Upload failed: {}", failure_detail(&e))));
                        UploadOutcome::Failed
                    }
                }
            }
            Transfer::Rule { doc_id, content } => {
                info!(%doc_id, "ingesting rule document");
                match self.backend.ingest_rule(&doc_id, &content).await {
                    Ok(message) => {
                        self.store.append(Message::system_notice(message.clone()));
                        UploadOutcome::Stored(message)
                    }
                    Err(e) => {
                        warn!(error = %e, %doc_id, "rule ingestion failed");
                        self.store.append(Message::error(format!(
                            "Rule ingestion failed: {}",
                            failure_detail(&e)
                        )));
                        UploadOutcome::Failed
                    }
                }
            }
        }
    }
}

/// The backend's detail when it sent one, otherwise the transport error.
fn failure_detail(err: &ClientError) -> String {
    err.detail()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;
    use crate::state::{ChatRole, MessageOrigin};

    fn controller_with(
        backend: FakeBackend,
    ) -> (UploadController, Arc<FakeBackend>, Arc<ConversationStore>) {
        let backend = Arc::new(backend);
        let store = Arc::new(ConversationStore::new());
        let controller = UploadController::new(backend.clone(), store.clone());
        (controller, backend, store)
    }

    fn invoice() -> InvoiceFile {
        InvoiceFile::new("inv-001.pdf", "application/pdf", b"%PDF".to_vec())
    }

    #[tokio::test]
    async fn test_success_logs_system_notice_with_id() {
        let (controller, backend, store) =
            controller_with(FakeBackend::new().reply_upload(Ok("INV-2024-001".to_string())));

        let outcome = controller.upload_invoice(Some(invoice())).await;
        assert_eq!(outcome, UploadOutcome::Stored("INV-2024-001".to_string()));
        assert_eq!(controller.phase(), UploadPhase::Idle);

        let messages = store.all();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, ChatRole::Assistant);
        assert_eq!(messages[0].origin, MessageOrigin::System);
        assert!(!messages[0].is_error);
        assert!(messages[0].payload.is_none());
        assert_eq!(messages[0].text(), "Successfully uploaded invoice: INV-2024-001");

        let uploaded = backend.uploaded.lock().unwrap();
        assert_eq!(uploaded.len(), 1);
        assert_eq!(uploaded[0].file_name, "inv-001.pdf");
    }

    #[tokio::test]
    async fn test_transport_failure_logs_transport_text() {
        let (controller, _backend, store) = controller_with(
            FakeBackend::new().reply_upload(Err(ClientError::Transport("connection refused".to_string()))),
        );

        assert_eq!(controller.upload_invoice(Some(invoice())).await, UploadOutcome::Failed);
        assert_eq!(controller.phase(), UploadPhase::Idle);

        let messages = store.all();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_error);
        assert_eq!(messages[0].text(), "Upload failed: connection refused");
    }

    #[tokio::test]
    async fn test_backend_detail_is_shown_verbatim() {
        let (controller, _backend, store) = controller_with(FakeBackend::new().reply_upload(Err(
            ClientError::Status {
                status: 400,
                detail: Some("Failed to extract data from invoice".to_string()),
            },
        )));

        controller.upload_invoice(Some(invoice())).await;
        assert_eq!(
            store.all()[0].text(),
            "Upload failed: Failed to extract data from invoice"
        );
    }

    #[tokio::test]
    async fn test_missing_identifier_is_reported_not_invented() {
        let (controller, _backend, store) = controller_with(FakeBackend::new().reply_upload(Err(
            ClientError::Backend("the backend did not return an invoice identifier".to_string()),
        )));

        assert_eq!(controller.upload_invoice(Some(invoice())).await, UploadOutcome::Failed);
        let messages = store.all();
        assert!(messages[0].is_error);
        assert!(messages[0].text().contains("did not return an invoice identifier"));
    }

    #[tokio::test]
    async fn test_cancelled_selection_is_a_no_op() {
        let (controller, backend, store) = controller_with(FakeBackend::new());

        assert_eq!(controller.upload_invoice(None).await, UploadOutcome::Ignored);
        assert!(store.is_empty());
        assert_eq!(backend.upload_calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.phase(), UploadPhase::Idle);
    }

    #[tokio::test]
    async fn test_reentrant_upload_is_rejected() {
        let (controller, backend, store) = controller_with(
            FakeBackend::gated().reply_upload(Ok("INV-1".to_string())),
        );

        let pending = controller.begin_invoice(Some(invoice())).unwrap();
        assert_eq!(pending.label(), "inv-001.pdf");
        assert_eq!(controller.phase(), UploadPhase::Uploading);
        let task = tokio::spawn(pending.run());

        assert_eq!(controller.upload_invoice(Some(invoice())).await, UploadOutcome::Busy);
        assert_eq!(controller.ingest_rule("rule-36", "text").await, UploadOutcome::Busy);

        backend.release();
        assert_eq!(task.await.unwrap(), UploadOutcome::Stored("INV-1".to_string()));
        assert_eq!(backend.upload_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(controller.phase(), UploadPhase::Idle);
    }

    #[tokio::test]
    async fn test_upload_and_question_gates_are_independent() {
        use crate::session::{QuerySession, SubmitOutcome};
        use serde_json::json;

        let backend = Arc::new(
            FakeBackend::new()
                .reply_upload(Ok("INV-9".to_string()))
                .reply_query(Ok(json!({"query_type": "STRUCTURED_QUERY", "structured_answer": "3"}))),
        );
        let store = Arc::new(ConversationStore::new());
        let controller = UploadController::new(backend.clone(), store.clone());
        let session = QuerySession::new(backend.clone(), store.clone());

        let upload = controller.begin_invoice(Some(invoice())).unwrap();
        assert_eq!(session.submit("how many invoices?").await, SubmitOutcome::Answered);
        assert_eq!(upload.run().await, UploadOutcome::Stored("INV-9".to_string()));

        let messages = store.all();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, ChatRole::User);
        assert!(messages[1].payload.is_some());
        assert!(messages[2].is_system());
    }

    #[tokio::test]
    async fn test_rule_ingestion() {
        let (controller, backend, store) = controller_with(
            FakeBackend::new()
                .reply_ingest(Ok("Document rule-36 ingested.".to_string()))
                .reply_ingest(Err(ClientError::Status {
                    status: 500,
                    detail: Some("vector store unavailable".to_string()),
                })),
        );

        assert_eq!(
            controller.ingest_rule("rule-36", "Input tax credit is limited...").await,
            UploadOutcome::Stored("Document rule-36 ingested.".to_string())
        );
        assert_eq!(
            controller.ingest_rule("rule-37", "Reversal of credit...").await,
            UploadOutcome::Failed
        );
        assert_eq!(controller.ingest_rule("  ", "content").await, UploadOutcome::Ignored);
        assert_eq!(controller.ingest_rule("rule-38", " ").await, UploadOutcome::Ignored);
        assert_eq!(backend.ingest_calls.load(Ordering::SeqCst), 2);

        let messages = store.all();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_system());
        assert_eq!(messages[1].text(), "Rule ingestion failed: vector store unavailable");
    }
}
