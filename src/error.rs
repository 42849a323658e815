use thiserror::Error;

/// Typed client errors.
///
/// Payloads are plain strings so the error can be cloned into a workflow
/// snapshot and shown again on the next render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Missing required input: {0}")]
    MissingInput(&'static str),
    #[error("Unsupported file: {0}")]
    FileType(String),
    #[error("Session rejected by service (status {0})")]
    Unauthorized(u16),
    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Coarse error classes shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected locally, nothing was sent.
    Validation,
    /// The call failed or the service answered with a non-success status.
    Transport,
    /// The selected document was refused before it could be attached.
    FileType,
}

impl ClientError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ClientError::Validation(_) | ClientError::MissingInput(_) => ErrorClass::Validation,
            ClientError::FileType(_) => ErrorClass::FileType,
            ClientError::Unauthorized(_)
            | ClientError::Service { .. }
            | ClientError::Network(_)
            | ClientError::Decode(_) => ErrorClass::Transport,
        }
    }

    /// Whether the error was raised before any request left the client.
    pub fn is_local(&self) -> bool {
        !matches!(self.class(), ErrorClass::Transport)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}
