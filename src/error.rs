//! Error handling for teamsync
//!
//! Every fallible operation in the crate returns [`Result`]. Errors carry an
//! [`ErrorCode`]; transient codes are retried by the REST adapters before
//! the error ever reaches the sync, which records what is left in the
//! report.

use thiserror::Error as ThisError;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Generic/unknown error
    Unknown,
    /// Invalid argument provided
    InvalidArgument,
    /// Network error
    NetworkError,
    /// Authentication failed
    AuthenticationFailed,
    /// Resource not found
    NotFound,
    /// Permission denied
    PermissionDenied,
    /// Timeout occurred
    Timeout,
    /// Invalid state for operation
    InvalidState,
    /// Rate limit exceeded and retries exhausted
    RateLimited,
    /// A response or document could not be parsed
    ParseError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unknown => "Unknown error",
            ErrorCode::InvalidArgument => "Invalid argument",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::AuthenticationFailed => "Authentication failed",
            ErrorCode::NotFound => "Not found",
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::Timeout => "Timeout",
            ErrorCode::InvalidState => "Invalid state",
            ErrorCode::RateLimited => "Rate limit exceeded",
            ErrorCode::ParseError => "Parse error",
        }
    }
}

/// Crate error type
#[derive(Debug, Clone, ThisError)]
#[error("{}: {message}", code.as_str())]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    /// Request ID from server headers for debugging
    pub(crate) request_id: Option<String>,
    /// HTTP status code if this error came from an HTTP response
    pub(crate) http_status: Option<u16>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Error {
            code,
            message: message.into(),
            request_id: None,
            http_status: None,
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::new(ErrorCode::InvalidArgument, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::new(ErrorCode::NotFound, msg)
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::new(ErrorCode::InvalidState, msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Error::new(ErrorCode::ParseError, msg)
    }

    /// Attach the server's request id (`x-github-request-id`, `request-id`)
    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Status of the response this error was built from
    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    /// Rate limits, network blips and timeouts
    pub fn is_transient(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::RateLimited | ErrorCode::NetworkError | ErrorCode::Timeout
        )
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            ErrorCode::Timeout
        } else if err.is_decode() {
            ErrorCode::ParseError
        } else {
            ErrorCode::NetworkError
        };
        let error = Error::new(code, err.to_string());
        match err.status() {
            Some(status) => error.with_http_status(status.as_u16()),
            None => error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::parse(format!("JSON error: {err}"))
    }
}

impl From<serde_yml::Error> for Error {
    fn from(err: serde_yml::Error) -> Self {
        Error::parse(format!("YAML error: {err}"))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::invalid_argument(format!("Invalid URL: {err}"))
    }
}
