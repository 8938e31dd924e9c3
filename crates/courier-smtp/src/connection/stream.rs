//! Low-level SMTP stream handling.

use crate::error::{Error, Result};
use crate::framing::{self, Line};
use rustls::pki_types::ServerName;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

/// SMTP stream (plaintext or TLS) over any byte stream.
#[derive(Debug)]
pub enum SmtpStream<S = TcpStream> {
    /// Plaintext connection.
    Plain(BufReader<S>),
    /// TLS-encrypted connection.
    Tls(Box<BufReader<TlsStream<S>>>),
    /// Placeholder while the stream is being upgraded.
    Closed,
}

impl<S> SmtpStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a plaintext stream.
    pub fn new(stream: S) -> Self {
        Self::Plain(BufReader::new(stream))
    }

    /// Returns true if the stream is encrypted.
    pub const fn is_encrypted(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Reads a line from the stream, without its line terminator.
    ///
    /// Returns `None` when the server closed the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the line is too long.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let line = match self {
            Self::Plain(reader) => {
                framing::read_line(reader, framing::DEFAULT_MAX_LINE_LENGTH).await?
            }
            Self::Tls(reader) => {
                framing::read_line(reader.as_mut(), framing::DEFAULT_MAX_LINE_LENGTH).await?
            }
            Self::Closed => return Err(closed()),
        };

        match line {
            Line::Complete(text) => Ok(Some(text)),
            Line::TooLong => Err(Error::Protocol("Reply line too long".into())),
            Line::Eof => Ok(None),
        }
    }

    /// Writes data to the stream without flushing.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Plain(reader) => reader.get_mut().write_all(data).await?,
            Self::Tls(reader) => reader.get_mut().write_all(data).await?,
            Self::Closed => return Err(closed()),
        }
        Ok(())
    }

    /// Flushes buffered writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub async fn flush(&mut self) -> Result<()> {
        match self {
            Self::Plain(reader) => reader.get_mut().flush().await?,
            Self::Tls(reader) => reader.get_mut().flush().await?,
            Self::Closed => return Err(closed()),
        }
        Ok(())
    }

    /// Writes data and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.write(data).await?;
        self.flush().await
    }

    /// Upgrades a plaintext stream to TLS.
    ///
    /// Bytes the server sent before the handshake are discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already encrypted or the TLS
    /// handshake fails.
    pub async fn upgrade_to_tls(
        self,
        connector: &TlsConnector,
        server_name: ServerName<'static>,
    ) -> Result<Self> {
        let reader = match self {
            Self::Plain(reader) => reader,
            Self::Tls(_) => return Err(Error::InvalidState("Already using TLS".into())),
            Self::Closed => return Err(closed()),
        };

        if !reader.buffer().is_empty() {
            tracing::warn!(
                bytes = reader.buffer().len(),
                "Discarding data received before TLS handshake"
            );
        }

        let tls_stream = connector.connect(server_name, reader.into_inner()).await?;
        Ok(Self::Tls(Box::new(BufReader::new(tls_stream))))
    }
}

fn closed() -> Error {
    Error::InvalidState("Connection closed".into())
}

/// Converts a hostname into a TLS server name.
///
/// # Errors
///
/// Returns an error if the hostname is not a valid DNS name or IP address.
pub fn server_name(hostname: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::InvalidDnsName(hostname.to_string()))
}

/// Connects to an SMTP server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails or times out.
pub async fn connect(hostname: &str, port: u16, timeout: Duration) -> Result<SmtpStream> {
    let addr = format!("{hostname}:{port}");
    let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| Error::Timeout(format!("connection to {addr}")))??;
    tracing::info!(%addr, "Connected");
    Ok(SmtpStream::new(stream))
}

/// Connects to an SMTP server over TLS (implicit TLS on port 465).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub async fn connect_tls(
    hostname: &str,
    port: u16,
    connector: &TlsConnector,
    timeout: Duration,
) -> Result<SmtpStream> {
    let name = server_name(hostname)?;
    connect(hostname, port, timeout)
        .await?
        .upgrade_to_tls(connector, name)
        .await
}
