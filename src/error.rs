//! Error types for the chat client

use std::fmt;
use thiserror::Error;

/// Failure of a single call to the remote chat API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Connection, timeout or body decoding errors from the HTTP client
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Base URL that cannot carry path segments
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// Any non-2xx response
    #[error("Server returned {status} for {url}")]
    Status { status: u16, url: String },

    /// The server answered but declined the operation
    #[error("Request rejected: {0}")]
    Rejected(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// The operation category a store failure belongs to.
/// The store only keeps the most recent one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    LoadSessionsFailed,
    LoadMessagesFailed,
    SendFailed,
    CreateFailed,
    DeleteFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::LoadSessionsFailed => "load-sessions-failed",
            ErrorKind::LoadMessagesFailed => "load-messages-failed",
            ErrorKind::SendFailed => "send-failed",
            ErrorKind::CreateFailed => "create-failed",
            ErrorKind::DeleteFailed => "delete-failed",
        }
    }

    /// Text shown to the user when the operation fails.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::LoadSessionsFailed => "Failed to load chat sessions. Please try again.",
            ErrorKind::LoadMessagesFailed => "Failed to load chat messages. Please try again.",
            ErrorKind::SendFailed => "Failed to send message. Please try again.",
            ErrorKind::CreateFailed => "Failed to create new chat. Please try again.",
            ErrorKind::DeleteFailed => "Failed to delete chat session. Please try again.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(ErrorKind::LoadSessionsFailed.to_string(), "load-sessions-failed");
        assert_eq!(ErrorKind::LoadMessagesFailed.to_string(), "load-messages-failed");
        assert_eq!(ErrorKind::SendFailed.to_string(), "send-failed");
        assert_eq!(ErrorKind::CreateFailed.to_string(), "create-failed");
        assert_eq!(ErrorKind::DeleteFailed.to_string(), "delete-failed");
    }

    #[test]
    fn test_status_error_message() {
        let err = ApiError::Status {
            status: 404,
            url: "http://localhost/api/chat/sessions/x/messages".to_string(),
        };
        assert!(err.to_string().contains("404"));
    }
}
