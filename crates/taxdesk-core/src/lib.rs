pub mod backend;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod session;
pub mod state;
pub mod store;
pub mod upload;

// Re-export main types for convenience
pub use backend::{AnalyticsClient, Backend, InvoiceFile};
pub use config::Config;
pub use error::ClientError;
pub use interpreter::{interpret, QueryKind, QueryResult};
pub use session::{PendingQuery, QuerySession, SubmitOutcome};
pub use state::{ChatRole, Message, MessageOrigin};
pub use store::ConversationStore;
pub use upload::{PendingUpload, UploadController, UploadOutcome, UploadPhase};
