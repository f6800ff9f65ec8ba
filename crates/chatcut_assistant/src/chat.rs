use chatcut_core::ErrorKind;
use serde::Serialize;
use serde_json::Value;

use crate::error::AssistantError;
use crate::protocol::{ChatMessage, Role};

pub const GREETING: &str = "Hi! I can help you analyze and edit your video. Select a portion of the timeline and ask me questions about it.";

/// One line of the visible conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatEntry {
    Text { role: Role, content: String },
    /// Audit record of an executed function call.
    Card { operation: String, arguments: Value },
    Error { message: String },
}

/// The conversation as the user sees it. Only `Text` entries are sent back
/// to the assistant.
#[derive(Debug, Clone, Serialize)]
pub struct ChatLog {
    entries: Vec<ChatEntry>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self {
            entries: vec![ChatEntry::Text {
                role: Role::Assistant,
                content: GREETING.to_string(),
            }],
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.entries.push(ChatEntry::Text {
            role: Role::User,
            content: content.into(),
        });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.entries.push(ChatEntry::Text {
            role: Role::Assistant,
            content: content.into(),
        });
    }

    pub fn push_card(&mut self, operation: impl Into<String>, arguments: Value) {
        self.entries.push(ChatEntry::Card {
            operation: operation.into(),
            arguments,
        });
    }

    pub fn push_error(&mut self, error: &AssistantError) {
        self.entries.push(ChatEntry::Error {
            message: error_message(error),
        });
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&ChatEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Messages for the next request.
    pub fn outbound(&self) -> Vec<ChatMessage> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                ChatEntry::Text { role, content } => Some(ChatMessage {
                    role: *role,
                    content: content.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Chat-visible text for a failed request. Service failures get a plain
/// apology; the other kinds name what went wrong so the user can rephrase.
pub fn error_message(error: &AssistantError) -> String {
    match error.kind() {
        ErrorKind::ExternalServiceFailure => error_reply(ErrorKind::ExternalServiceFailure).to_string(),
        kind => format!("{} ({error})", error_reply(kind)),
    }
}

/// Fixed lead-in for each error kind.
pub fn error_reply(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NotFound => {
            "Sorry, I couldn't find the clip that step referred to. Please check the timeline and try again."
        }
        ErrorKind::InvalidArgument => {
            "Sorry, I couldn't apply that edit with those parameters. Please try rephrasing your request."
        }
        ErrorKind::ExternalServiceFailure => {
            "Sorry, I encountered an error processing your request."
        }
    }
}
