//! Scripted [`Backend`] for session and upload tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

use super::{Backend, InvoiceFile};
use crate::error::ClientError;

#[derive(Default)]
pub(crate) struct FakeBackend {
    query_replies: Mutex<VecDeque<Result<Value, ClientError>>>,
    upload_replies: Mutex<VecDeque<Result<String, ClientError>>>,
    ingest_replies: Mutex<VecDeque<Result<String, ClientError>>>,
    pub query_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub ingest_calls: AtomicUsize,
    pub questions: Mutex<Vec<String>>,
    pub uploaded: Mutex<Vec<InvoiceFile>>,
    /// When set, every call waits for a notification before replying.
    gate: Option<Notify>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose replies are held until [`FakeBackend::release`].
    pub fn gated() -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::default()
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn reply_query(self, reply: Result<Value, ClientError>) -> Self {
        self.query_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn reply_upload(self, reply: Result<String, ClientError>) -> Self {
        self.upload_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn reply_ingest(self, reply: Result<String, ClientError>) -> Self {
        self.ingest_replies.lock().unwrap().push_back(reply);
        self
    }

    async fn wait_for_release(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn query(&self, question: &str) -> Result<Value, ClientError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.questions.lock().unwrap().push(question.to_string());
        self.wait_for_release().await;
        self.query_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Transport("no scripted reply".to_string())))
    }

    async fn upload_invoice(&self, file: InvoiceFile) -> Result<String, ClientError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.uploaded.lock().unwrap().push(file);
        self.wait_for_release().await;
        self.upload_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Transport("no scripted reply".to_string())))
    }

    async fn ingest_rule(&self, _doc_id: &str, _content: &str) -> Result<String, ClientError> {
        self.ingest_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_for_release().await;
        self.ingest_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Transport("no scripted reply".to_string())))
    }

    async fn health(&self) -> Result<String, ClientError> {
        Ok("System Operational".to_string())
    }
}
