//! Server-side byte stream, plaintext or TLS.

use crate::framing::{self, Line};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;

/// A session's connection.
pub(crate) enum Transport<S> {
    Plain(BufReader<S>),
    Tls(Box<BufReader<TlsStream<S>>>),
    /// Placeholder while the stream is being upgraded.
    Closed,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(stream: S) -> Self {
        Self::Plain(BufReader::new(stream))
    }

    pub(crate) const fn is_encrypted(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    pub(crate) async fn read_line(&mut self, max_length: usize) -> io::Result<Line> {
        match self {
            Self::Plain(reader) => framing::read_line(reader, max_length).await,
            Self::Tls(reader) => framing::read_line(reader.as_mut(), max_length).await,
            Self::Closed => Ok(Line::Eof),
        }
    }

    /// Writes and flushes.
    pub(crate) async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Self::Plain(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await
            }
            Self::Tls(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await
            }
            Self::Closed => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    pub(crate) async fn shutdown(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(reader) => reader.get_mut().shutdown().await,
            Self::Tls(reader) => reader.get_mut().shutdown().await,
            Self::Closed => Ok(()),
        }
    }

    /// Runs the server side of a TLS handshake.
    ///
    /// Bytes the client sent before the handshake are discarded. On failure
    /// the plaintext transport is handed back with the error.
    pub(crate) async fn upgrade(self, acceptor: &TlsAcceptor) -> Result<Self, (io::Error, Self)> {
        let reader = match self {
            Self::Plain(reader) => reader,
            other => {
                return Err((
                    io::Error::new(io::ErrorKind::Unsupported, "transport is not plaintext"),
                    other,
                ));
            }
        };

        if !reader.buffer().is_empty() {
            tracing::warn!(
                bytes = reader.buffer().len(),
                "Discarding data received before TLS handshake"
            );
        }

        match acceptor.accept(reader.into_inner()).into_fallible().await {
            Ok(stream) => Ok(Self::Tls(Box::new(BufReader::new(stream)))),
            Err((e, stream)) => Err((e, Self::new(stream))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_read_and_write() {
        let (client, server) = tokio::io::duplex(256);
        let mut transport = Transport::new(server);
        let (mut client_read, mut client_write) = tokio::io::split(client);

        client_write.write_all(b"EHLO client\r\n").await.unwrap();
        assert_eq!(
            transport.read_line(100).await.unwrap(),
            Line::Complete("EHLO client".into())
        );

        transport.write_all(b"250 OK\r\n").await.unwrap();
        let mut buf = [0u8; 8];
        client_read.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"250 OK\r\n");
        assert!(!transport.is_encrypted());
    }

    #[tokio::test]
    async fn test_closed_transport() {
        let mut transport: Transport<tokio::io::DuplexStream> = Transport::Closed;
        assert_eq!(transport.read_line(100).await.unwrap(), Line::Eof);
        assert!(transport.write_all(b"x").await.is_err());
    }
}
