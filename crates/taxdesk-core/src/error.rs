//! Error types for talking to the analytics backend.

/// Failures of a single backend round trip.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Backend unreachable, connection dropped, or the body could not be read.
    #[error("{0}")]
    Transport(String),
    /// Non-2xx response, with the backend's `detail` when it sent one.
    #[error("request failed with status {status}{}", detail_suffix(.detail))]
    Status { status: u16, detail: Option<String> },
    /// 2xx response that reports an error or lacks the expected fields.
    #[error("{0}")]
    Backend(String),
    /// 2xx response whose body is not JSON.
    #[error("malformed response: {0}")]
    Malformed(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(": {}", d),
        None => String::new(),
    }
}

impl ClientError {
    /// The backend-provided explanation, when the failure carries one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ClientError::Status { detail, .. } => detail.as_deref(),
            ClientError::Backend(detail) => Some(detail),
            ClientError::Transport(_) | ClientError::Malformed(_) => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Malformed(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}
