//! Request-level error types
//!
//! Handlers return `HttpResult<()>`; an `Err` makes the dispatcher
//! force-close the response with status 500 unless the handler already
//! closed it.

use thiserror::Error;

/// Result type handlers and body parsing return
pub type HttpResult<T> = Result<T, HttpError>;

/// Errors raised while serving a single request
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("invalid request: {message}")]
    BadRequest { message: String },

    #[error("internal server error: {message}")]
    Internal { message: String },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl HttpError {
    /// Create a bad request error
    pub fn bad_request<T: Into<String>>(message: T) -> Self {
        HttpError::BadRequest {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<T: Into<String>>(message: T) -> Self {
        HttpError::Internal {
            message: message.into(),
        }
    }
}

/// Body parsing failures, delivered to the handler as an `Err`
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid form body: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    #[error("invalid multipart body: {message}")]
    Multipart { message: String },

    #[error("request body is not valid UTF-8")]
    Encoding,
}

impl ParseError {
    /// Create a multipart parsing error
    pub fn multipart<T: Into<String>>(message: T) -> Self {
        ParseError::Multipart {
            message: message.into(),
        }
    }
}
