use reqwest::StatusCode;
use thiserror::Error;

/// Broad classification of an [`AuthError`], delivered to hosts alongside the
/// message so they can branch without matching on variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid client/provider configuration.
    Config,
    /// Transport failure or a non-2xx response.
    Network,
    /// Malformed JSON or state blob.
    Parse,
    /// The provider reported an error, or a well-formed response is missing a
    /// required field.
    Protocol,
    /// The redirect is ours but lacks the `code`/`state` parameters.
    State,
}

/// Errors surfaced by the sign-in flow and its follow-up calls.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("request failed with status {status}")]
    Status { status: StatusCode, body: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("provider error: {0}")]
    Protocol(String),
    #[error("invalid redirect: {0}")]
    Redirect(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Config(_) | AuthError::Url(_) => ErrorKind::Config,
            AuthError::Status { .. } | AuthError::Http(_) => ErrorKind::Network,
            AuthError::Parse(_) => ErrorKind::Parse,
            AuthError::Protocol(_) => ErrorKind::Protocol,
            AuthError::Redirect(_) => ErrorKind::State,
        }
    }

    /// HTTP status of the failed request, when one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AuthError::Status { status, .. } => Some(*status),
            AuthError::Http(err) => err.status(),
            _ => None,
        }
    }
}
