use thiserror::Error;

/// Failure talking to the chat endpoint.
///
/// Every variant ends up as the same fallback reply in the transcript; the
/// variant only matters for the log.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request to chat endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("chat endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("reply task did not complete: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for ChatError {
    fn from(err: tokio::task::JoinError) -> Self {
        ChatError::Task(err.to_string())
    }
}
