use thiserror::Error;

/// Coarse classification shared by every error type in the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    ExternalServiceFailure,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Clip not found: {0}")]
    ClipNotFound(uuid::Uuid),

    #[error("Media not found: {0}")]
    MediaNotFound(uuid::Uuid),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Clip {0} is locked by a pending transform")]
    ClipLocked(uuid::Uuid),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Playback surface error: {0}")]
    Surface(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ClipNotFound(_) | CoreError::MediaNotFound(_) => ErrorKind::NotFound,
            CoreError::InvalidArgument(_)
            | CoreError::ClipLocked(_)
            | CoreError::UnknownOperation(_)
            | CoreError::Json(_) => ErrorKind::InvalidArgument,
            CoreError::Io(_) | CoreError::Surface(_) => ErrorKind::ExternalServiceFailure,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CoreError::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_error_classes() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(CoreError::ClipNotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(CoreError::MediaNotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(
            CoreError::invalid("cut point out of range").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(CoreError::ClipLocked(id).kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            CoreError::Surface("mpv gone".into()).kind(),
            ErrorKind::ExternalServiceFailure
        );
    }
}
