//! Question/answer cycles against the analytics backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::error::ClientError;
use crate::interpreter::interpret;
use crate::state::Message;
use crate::store::ConversationStore;

/// Shown when a failed question carries no backend detail.
pub const FALLBACK_ERROR: &str = "System error, ensure backend is reachable.";

/// How a submission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank question; nothing was sent or logged.
    Ignored,
    /// Another question is still outstanding; nothing was sent or logged.
    Busy,
    Answered,
    Failed,
}

/// Serializes questions: at most one request is outstanding at a time.
#[derive(Clone)]
pub struct QuerySession {
    backend: Arc<dyn Backend>,
    store: Arc<ConversationStore>,
    busy: Arc<AtomicBool>,
}

impl QuerySession {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<ConversationStore>) -> Self {
        Self {
            backend,
            store,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Ask a question and wait for the answer to be logged.
    pub async fn submit(&self, question: &str) -> SubmitOutcome {
        match self.begin(question) {
            Ok(pending) => pending.run().await,
            Err(outcome) => outcome,
        }
    }

    /// Validate, take the busy flag and log the user's question without
    /// waiting on the network. The returned [`PendingQuery`] performs the
    /// round trip; until it finishes the session stays busy. Dropping it
    /// unfinished logs [`FALLBACK_ERROR`] as the answer.
    ///
    /// Returns `Err(Ignored)` for blank input and `Err(Busy)` while another
    /// question is outstanding.
    pub fn begin(&self, question: &str) -> Result<PendingQuery, SubmitOutcome> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SubmitOutcome::Ignored);
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("question rejected, another one is outstanding");
            return Err(SubmitOutcome::Busy);
        }
        let guard = BusyGuard {
            busy: self.busy.clone(),
            unanswered: Some(self.store.clone()),
        };

        self.store.append(Message::user(question));

        Ok(PendingQuery {
            backend: self.backend.clone(),
            store: self.store.clone(),
            question: question.to_string(),
            guard,
        })
    }
}

/// Clears the busy flag however the round trip ends. A question dropped
/// before its answer was logged still gets an error reply, so every
/// question in the log is followed by exactly one answer.
struct BusyGuard {
    busy: Arc<AtomicBool>,
    unanswered: Option<Arc<ConversationStore>>,
}

impl BusyGuard {
    fn answered(&mut self) {
        self.unanswered = None;
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if let Some(store) = self.unanswered.take() {
            warn!("question dropped before it was answered");
            store.append(Message::error(FALLBACK_ERROR));
        }
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// A question that has been logged and is waiting to be sent.
pub struct PendingQuery {
    backend: Arc<dyn Backend>,
    store: Arc<ConversationStore>,
    question: String,
    guard: BusyGuard,
}

impl PendingQuery {
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Send the question and log exactly one answer or error message.
    pub async fn run(mut self) -> SubmitOutcome {
        info!(chars = self.question.len(), "sending question");

        let (reply, outcome) = match self.backend.query(&self.question).await {
            Ok(raw) => {
                let result = interpret(&raw);
                info!(kind = ?result.kind(), "question answered");
                (Message::result(result), SubmitOutcome::Answered)
            }
            Err(e) => {
                warn!(error = %e, "question failed");
                (Message::error(failure_text(&e)), SubmitOutcome::Failed)
            }
        };
        self.guard.answered();
        self.store.append(reply);
        outcome
    }
}

fn failure_text(err: &ClientError) -> String {
    match err.detail() {
        Some(detail) => format!("Query failed: {}", detail),
        None => FALLBACK_ERROR.to_string(),
    }
}
