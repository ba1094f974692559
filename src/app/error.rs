use thiserror::Error;

use crate::backend::BackendError;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected before any backend call.
    #[error("{0}")]
    Validation(String),

    #[error("You can only delete your own posts")]
    NotAuthor,

    #[error("That post no longer exists")]
    NotFound,

    #[error("Failed to {action}: {source}")]
    Backend {
        action: &'static str,
        #[source]
        source: BackendError,
    },
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    /// Log a failed backend call and wrap it with the action that failed.
    pub fn backend(action: &'static str, source: BackendError) -> Self {
        tracing::error!("{} failed: {}", action, source);
        ClientError::Backend { action, source }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
