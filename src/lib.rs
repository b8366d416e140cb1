//! Synchronous HTTP/1.1 client
//!
//! This crate provides a small, fully synchronous HTTP/1.1 client built
//! around a non-blocking socket and a `select`-based deadline loop. A
//! [`Request`] is constructed once from a URL, may be reused for many calls,
//! and holds no connection between them.
//!
//! The wire codec (URI parsing, request encoding, status-line and header
//! parsing, chunked transfer decoding) is exposed at module level so it can
//! be used and tested without touching the network.
//!
//! Only the `http` scheme is supported; TLS, redirects, keep-alive and
//! HTTP/2 are out of scope. The crate targets Unix-like platforms.
//!
//! # Examples
//!
//! ```no_run
//! use std::time::Duration;
//!
//! let request = httpreq::Request::new("http://example.com/")?;
//! let response = request.get(Some(Duration::from_secs(2)))?;
//! assert_eq!(response.status.code, 200);
//! # Ok::<(), httpreq::Error>(())
//! ```

pub mod chars;
pub mod encoder;
pub mod parser;
pub mod request;
pub mod socket;
pub mod uri;

pub use parser::{HttpVersion, Status};
pub use request::{HeaderField, InternetProtocol, Request, Response};
pub use uri::Uri;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// CRLF line ending
pub const CRLF: &str = "\r\n";

/// Port the request driver substitutes when the URI carries none
pub const DEFAULT_PORT: &str = "80";

/// Top-level error, covering all three failure domains
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error(transparent)]
    System(#[from] SystemError),
}

/// Caller-side problem detected before or independent of the network
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid URI")]
    InvalidUri,

    #[error("Only HTTP scheme is supported")]
    UnsupportedScheme,

    #[error("Invalid header field name")]
    InvalidHeaderName,

    #[error("Invalid header field value")]
    InvalidHeaderValue,
}

/// Wire- or server-side problem while reading the response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    #[error("Invalid HTTP version")]
    InvalidVersion,

    #[error("Invalid status code")]
    InvalidStatusCode,

    #[error("Invalid status line")]
    InvalidStatusLine,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid header")]
    InvalidHeader,

    #[error("Invalid digit")]
    InvalidDigit,

    #[error("Invalid hex digit")]
    InvalidHexDigit,

    #[error("Unsupported transfer encoding: {0}")]
    UnsupportedTransferEncoding(String),

    #[error("Invalid chunk")]
    InvalidChunk,

    #[error("Request timed out")]
    Timeout,
}

/// Operating system failure carrying the numeric error condition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (os error {code})")]
pub struct SystemError {
    message: String,
    code: i32,
}

impl SystemError {
    pub(crate) fn new(code: i32, message: impl Into<String>) -> Self {
        SystemError {
            message: message.into(),
            code,
        }
    }

    /// The platform error code (`errno`, or the `getaddrinfo` return value)
    pub fn code(&self) -> i32 {
        self.code
    }

    /// The descriptive prefix, without the error code
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Error {
    /// Rewrite the message of a system error, keeping its code.
    ///
    /// Request and response errors pass through untouched; their messages
    /// are part of the API contract.
    pub(crate) fn with_message(self, message: impl Into<String>) -> Self {
        match self {
            Error::System(error) => Error::System(SystemError::new(error.code, message)),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_domains_are_distinguishable() {
        let request: Error = RequestError::UnsupportedScheme.into();
        let response: Error = ResponseError::InvalidStatusLine.into();

        assert!(matches!(request, Error::Request(_)));
        assert!(matches!(response, Error::Response(_)));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            RequestError::UnsupportedScheme.to_string(),
            "Only HTTP scheme is supported"
        );
        assert_eq!(ResponseError::Timeout.to_string(), "Request timed out");
        assert_eq!(
            ResponseError::UnsupportedTransferEncoding("gzip".to_string()).to_string(),
            "Unsupported transfer encoding: gzip"
        );
    }

    #[test]
    fn test_system_error_carries_code() {
        let error = SystemError::new(111, "Failed to connect to test.com:80");
        assert_eq!(error.code(), 111);
        assert_eq!(
            error.to_string(),
            "Failed to connect to test.com:80 (os error 111)"
        );
    }

    #[test]
    fn test_with_message_only_rewrites_system_errors() {
        let error: Error = SystemError::new(32, "Failed to send data").into();
        let error = error.with_message("Failed to send data to test.com:80");
        match error {
            Error::System(error) => {
                assert_eq!(error.code(), 32);
                assert_eq!(error.message(), "Failed to send data to test.com:80");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let error: Error = ResponseError::Timeout.into();
        let error = error.with_message("rewritten");
        assert_eq!(error.to_string(), "Request timed out");
    }
}
