//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Hostname not usable as a TLS server name.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(String),

    /// Server returned error response.
    #[error("SMTP error {code}: {message}")]
    Smtp {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Server announced it is closing the connection (421).
    #[error("Service closing: {0}")]
    ServiceClosing(String),

    /// No reply within the configured timeout.
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    /// STARTTLS could not be negotiated or was required but unavailable.
    #[error("TLS negotiation failed: {0}")]
    TlsNegotiation(String),

    /// Protocol error (unexpected or malformed response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Content could not be encoded or decoded.
    #[error("MIME error: {0}")]
    Mime(#[from] courier_mime::Error),

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),

    /// No mail server accepted a connection for the domain.
    #[error("No reachable mail server for {0}")]
    NoMailServer(String),

    /// MX lookup failed.
    #[error("DNS resolution failed: {0}")]
    Resolve(String),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::Smtp {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Smtp { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx or service closing).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Smtp { code, .. } if *code >= 400 && *code < 500)
            || matches!(self, Self::ServiceClosing(_))
    }

    /// Returns true if the operation may succeed on another connection.
    ///
    /// Only connection-level failures qualify. A server that replied, even
    /// with 421, is never retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Tls(_) | Self::Timeout(_) | Self::TlsNegotiation(_)
        )
    }
}
