//! UI-agnostic conversation types
//!
//! These structures are shared by every surface that renders the conversation
//! and don't depend on any specific UI framework.

use serde::{Deserialize, Serialize};

use crate::interpreter::QueryResult;

/// One entry in the conversation log.
///
/// Fields are only ever set through the constructors below, so a user message
/// never carries a payload and a successful assistant message carries either
/// text or a payload, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: ChatRole,
    pub content: Option<String>,
    pub is_error: bool,
    pub payload: Option<QueryResult>,
    pub origin: MessageOrigin,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

/// Where an assistant message came from: an answer in the conversation, or a
/// notice produced by the client itself (uploads, health checks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageOrigin {
    #[default]
    Conversation,
    System,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: Some(text.into()),
            is_error: false,
            payload: None,
            origin: MessageOrigin::Conversation,
        }
    }

    /// Successful answer to a question.
    pub fn result(payload: QueryResult) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: None,
            is_error: false,
            payload: Some(payload),
            origin: MessageOrigin::Conversation,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: Some(text.into()),
            is_error: true,
            payload: None,
            origin: MessageOrigin::Conversation,
        }
    }

    pub fn system_notice(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: Some(text.into()),
            is_error: false,
            payload: None,
            origin: MessageOrigin::System,
        }
    }

    pub fn is_system(&self) -> bool {
        self.origin == MessageOrigin::System
    }

    /// Plain text to show when there is no structured payload.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}
