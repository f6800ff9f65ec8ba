pub mod chat;
pub mod client;
pub mod command_loop;
pub mod error;
pub mod ingest;
pub mod protocol;

pub use chat::{ChatEntry, ChatLog};
pub use client::{AssistantEndpoint, HttpAssistant, HttpPreprocessor, Preprocessor};
pub use command_loop::{CommandLoop, TaskSummary};
pub use error::{AssistantError, Result};
