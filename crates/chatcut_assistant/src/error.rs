use chatcut_core::{CoreError, ErrorKind};
use chatcut_render::RenderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task {task_id:?} issued {steps} function calls without finishing")]
    StepLimit {
        task_id: Option<String>,
        steps: usize,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl AssistantError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AssistantError::Core(e) => e.kind(),
            AssistantError::Render(e) => e.kind(),
            AssistantError::Http(_)
            | AssistantError::Status { .. }
            | AssistantError::Json(_)
            | AssistantError::Io(_)
            | AssistantError::StepLimit { .. } => ErrorKind::ExternalServiceFailure,
        }
    }
}

pub type Result<T> = std::result::Result<T, AssistantError>;
