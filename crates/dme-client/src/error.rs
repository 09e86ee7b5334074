use thiserror::Error;

pub type DmeResult<T> = Result<T, DmeError>;

#[derive(Debug, Error)]
pub enum DmeError {
    /// Required prior state or configuration is missing. Nothing was sent.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("transport rejected request: status={status}")]
    TransportStatus { status: reqwest::StatusCode },
    /// The server answered, but with a non-success status.
    #[error("protocol error: code={code} message={message}")]
    Protocol { code: i32, message: String },
    #[error("failed to decode reply: {0}")]
    Parse(String),
}

impl DmeError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        DmeError::Configuration(message.into())
    }

    pub(crate) fn protocol(code: i32, message: impl Into<String>) -> Self {
        DmeError::Protocol {
            code,
            message: message.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, DmeError::Configuration(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DmeError::Transport(_) | DmeError::TransportStatus { .. }
        )
    }
}

impl From<serde_json::Error> for DmeError {
    fn from(err: serde_json::Error) -> Self {
        DmeError::Parse(err.to_string())
    }
}

impl From<bincode::Error> for DmeError {
    fn from(err: bincode::Error) -> Self {
        DmeError::Parse(err.to_string())
    }
}
