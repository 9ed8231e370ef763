use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use taxdesk_core::{
    Backend, ConversationStore, InvoiceFile, Message, QuerySession, SubmitOutcome,
    UploadController, UploadOutcome, UploadPhase,
};

use crate::picker::{FilePicker, PickerChoice};

/// Draft prefix that sends a rule document instead of a question.
pub const INGEST_COMMAND: &str = ":ingest";

pub struct App {
    // Core state
    pub should_quit: bool,
    pub backend_url: String,

    // Conversation
    pub store: Arc<ConversationStore>,
    pub session: QuerySession,
    pub uploader: UploadController,
    backend: Arc<dyn Backend>,

    // Draft input
    pub draft_input: String,
    pub draft_cursor: usize, // cursor position in draft_input, in chars

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the chat pane, set during render
    pub follow_bottom: bool,

    // Transient one-line feedback in the footer
    pub status: Option<String>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Invoice picker
    pub picker: Option<FilePicker>,
    pub picker_root: PathBuf,

    // Background round trips
    pub query_task: Option<JoinHandle<SubmitOutcome>>,
    pub upload_task: Option<JoinHandle<UploadOutcome>>,
    pub upload_label: Option<String>,
    pub task_done: Arc<Notify>, // signalled once a round trip's gate is released
}

impl App {
    pub fn new(backend: Arc<dyn Backend>, backend_url: &str, picker_root: &Path) -> Self {
        let store = Arc::new(ConversationStore::new());
        let session = QuerySession::new(backend.clone(), store.clone());
        let uploader = UploadController::new(backend.clone(), store.clone());

        Self {
            should_quit: false,
            backend_url: backend_url.to_string(),
            store,
            session,
            uploader,
            backend,
            draft_input: String::new(),
            draft_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            follow_bottom: true,
            status: None,
            animation_frame: 0,
            picker: None,
            picker_root: picker_root.to_path_buf(),
            query_task: None,
            upload_task: None,
            upload_label: None,
            task_done: Arc::new(Notify::new()),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_busy()
    }

    pub fn is_uploading(&self) -> bool {
        self.uploader.phase() == UploadPhase::Uploading
    }

    /// Something is in flight; drives the progress indicator.
    pub fn in_progress(&self) -> bool {
        self.is_busy() || self.is_uploading()
    }

    /// The submit affordance is live only when idle with a non-blank draft.
    pub fn can_submit(&self) -> bool {
        !self.is_busy() && !self.draft_input.trim().is_empty()
    }

    /// Spawn a round trip and signal `task_done` after it has completed,
    /// by which point its busy or upload gate is clear.
    fn spawn_round_trip<T, F>(&self, round_trip: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let done = self.task_done.clone();
        tokio::spawn(async move {
            let outcome = round_trip.await;
            done.notify_one();
            outcome
        })
    }

    /// Log one notice about whether the backend answers.
    pub fn check_backend(&self) {
        let backend = self.backend.clone();
        let store = self.store.clone();
        let url = self.backend_url.clone();
        tokio::spawn(async move {
            match backend.health().await {
                Ok(status) => {
                    info!(%url, %status, "backend reachable");
                    store.append(Message::system_notice(format!("Connected to {}: {}", url, status)));
                }
                Err(e) => {
                    warn!(%url, error = %e, "backend health check failed");
                    store.append(Message::error(format!("Backend at {} is not reachable: {}", url, e)));
                }
            }
        });
    }

    /// Send the draft: a question, or an `:ingest <doc_id> <path>` command.
    pub async fn submit_draft(&mut self) {
        let command_args = self
            .draft_input
            .trim()
            .strip_prefix(INGEST_COMMAND)
            .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace));
        if let Some(args) = command_args {
            let args = args.trim().to_string();
            self.ingest_rule_command(&args).await;
            return;
        }

        match self.session.begin(&self.draft_input) {
            Ok(pending) => {
                self.clear_draft();
                self.status = None;
                self.follow_bottom = true;
                self.query_task = Some(self.spawn_round_trip(pending.run()));
            }
            Err(SubmitOutcome::Busy) => {
                self.status = Some("Still waiting for the previous answer".to_string());
            }
            Err(_) => {}
        }
    }

    async fn ingest_rule_command(&mut self, args: &str) {
        let mut parts = args.splitn(2, char::is_whitespace);
        let (Some(doc_id), Some(path)) = (parts.next(), parts.next()) else {
            self.status = Some(format!("Usage: {} <doc_id> <path>", INGEST_COMMAND));
            return;
        };
        if self.is_uploading() {
            self.status = Some("A transfer is already running".to_string());
            return;
        }

        let path = path.trim();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                self.status = Some(format!("Cannot read {}: {}", path, e));
                return;
            }
        };

        match self.uploader.begin_rule(doc_id, &content) {
            Ok(pending) => {
                self.clear_draft();
                self.status = None;
                self.follow_bottom = true;
                self.upload_label = Some(pending.label().to_string());
                self.upload_task = Some(self.spawn_round_trip(pending.run()));
            }
            Err(UploadOutcome::Busy) => {
                self.status = Some("A transfer is already running".to_string());
            }
            Err(_) => {
                self.status = Some(format!("{} is empty", path));
            }
        }
    }

    pub fn open_picker(&mut self) {
        if self.is_uploading() {
            self.status = Some("An upload is already running".to_string());
            return;
        }
        match FilePicker::open(&self.picker_root) {
            Ok(picker) => self.picker = Some(picker),
            Err(e) => self.status = Some(e.to_string()),
        }
    }

    /// Closing the picker without choosing is a cancelled selection.
    pub fn close_picker(&mut self) {
        if let Some(picker) = self.picker.take() {
            self.picker_root = picker.dir;
        }
    }

    pub fn picker_nav_down(&mut self) {
        if let Some(picker) = self.picker.as_mut() {
            picker.nav_down();
        }
    }

    pub fn picker_nav_up(&mut self) {
        if let Some(picker) = self.picker.as_mut() {
            picker.nav_up();
        }
    }

    /// Enter on the picker: descend into a directory or upload the file.
    pub async fn picker_confirm(&mut self) {
        let Some(picker) = self.picker.as_mut() else {
            return;
        };
        let path = match picker.confirm() {
            Ok(PickerChoice::File(path)) => path,
            Ok(_) => return,
            Err(e) => {
                self.status = Some(e.to_string());
                return;
            }
        };
        self.close_picker();

        let file = match InvoiceFile::from_path(&path).await {
            Ok(file) => file,
            Err(e) => {
                self.status = Some(e.to_string());
                return;
            }
        };

        match self.uploader.begin_invoice(Some(file)) {
            Ok(pending) => {
                self.status = None;
                self.follow_bottom = true;
                self.upload_label = Some(pending.label().to_string());
                self.upload_task = Some(self.spawn_round_trip(pending.run()));
            }
            Err(UploadOutcome::Busy) => {
                self.status = Some("An upload is already running".to_string());
            }
            Err(_) => {}
        }
    }

    /// Reap finished background tasks.
    pub fn poll_tasks(&mut self) {
        if self.query_task.as_ref().is_some_and(|t| t.is_finished()) {
            self.query_task = None;
        }
        if self.upload_task.as_ref().is_some_and(|t| t.is_finished()) {
            self.upload_task = None;
            self.upload_label = None;
        }
    }

    /// The log grew; keep the newest message in view unless the user scrolled up.
    pub fn on_log_changed(&mut self) {
        if !self.store.is_empty() && self.follow_bottom {
            self.chat_scroll = u16::MAX;
        }
    }

    pub fn tick_animation(&mut self) {
        if self.in_progress() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn clear_draft(&mut self) {
        self.draft_input.clear();
        self.draft_cursor = 0;
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use taxdesk_core::ClientError;

    /// Answers every question with the question itself.
    pub struct EchoBackend;

    #[async_trait]
    impl Backend for EchoBackend {
        async fn query(&self, question: &str) -> Result<Value, ClientError> {
            Ok(json!({"query_type": "UNSTRUCTURED_QUERY", "rag_answer": question}))
        }

        async fn upload_invoice(&self, file: InvoiceFile) -> Result<String, ClientError> {
            Ok(format!("ID-{}", file.file_name))
        }

        async fn ingest_rule(&self, doc_id: &str, _content: &str) -> Result<String, ClientError> {
            Ok(format!("Document {} ingested.", doc_id))
        }

        async fn health(&self) -> Result<String, ClientError> {
            Err(ClientError::Transport("connection refused".to_string()))
        }
    }

    pub fn app_in(dir: &Path) -> App {
        App::new(Arc::new(EchoBackend), "http://localhost:8000", dir)
    }
}
