//! Error types for the token broker

use std::io;

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for the token broker
pub type Result<T> = std::result::Result<T, Error>;

/// Token broker errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (fatal, startup only)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Vault unreachable
    #[error("Connection error: {0}")]
    Connection(String),

    /// CA material missing or invalid, or TLS validation failed
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Vault rejected the bootstrap login
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Caller holds none of the allowed groups
    #[error("User has no allowed groups")]
    Authorization,

    /// Vault rejected the token creation request
    #[error("{0}")]
    Issuance(String),

    /// Request body is not the expected JSON
    #[error("{0}")]
    MalformedInput(String),

    /// Request body could not be read
    #[error("{0}")]
    BodyRead(String),

    /// Issued secret could not be serialized
    #[error("{0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map a request-path error to the status code and plain-text body
    /// returned to the caller.
    #[must_use]
    pub fn to_http_response(&self) -> (StatusCode, String) {
        match self {
            Self::Authorization => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "User has no allowed groups".to_string(),
            ),
            Self::Issuance(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get token: {msg}"),
            ),
            Self::MalformedInput(msg) => {
                (StatusCode::BAD_REQUEST, format!("Failed to parse body: {msg}"))
            }
            Self::BodyRead(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read body: {msg}"),
            ),
            Self::Serialization(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialize vault response: {msg}"),
            ),
            Self::Connection(_) | Self::Certificate(_) | Self::Authentication(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to create vault session: {self}"),
            ),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        }
    }

    /// Classify a transport-level `reqwest` failure.
    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        Self::classify_transport(err)
    }

    /// Walk the source chain: TLS handshake failures surface as an
    /// `io::Error` of kind `InvalidData` wrapping the rustls error; anything
    /// else is a connection failure. rustls is not a direct dependency, so
    /// when no such `io::Error` is present the chain text is searched for
    /// "certificate" as a fallback.
    fn classify_transport(err: &(dyn std::error::Error + 'static)) -> Self {
        let text = error_chain(err);
        let mut source = Some(err);
        while let Some(inner) = source {
            if inner
                .downcast_ref::<io::Error>()
                .is_some_and(|e| e.kind() == io::ErrorKind::InvalidData)
            {
                return Self::Certificate(text);
            }
            source = inner.source();
        }
        if text.to_ascii_lowercase().contains("certificate") {
            Self::Certificate(text)
        } else {
            Self::Connection(text)
        }
    }
}

/// Flatten an error and its sources into one line.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}
