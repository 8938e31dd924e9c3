//! SMTP client.
//!
//! [`Client`] drives one connection sequentially. Every method takes
//! `&mut self`, so the message being composed (headers and recipients) is
//! only ever touched by one caller at a time.

use super::stream::{self, SmtpStream};
use super::{Config, Security, ServerInfo};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::mail::{Mail, rfc2822_now};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, Reply, ReplyCode};
use courier_mime::{Content, Headers};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::Instrument;

/// SMTP client over a plaintext or TLS stream.
#[derive(Debug)]
pub struct Client<S = TcpStream> {
    stream: SmtpStream<S>,
    config: Config,
    host: String,
    welcome: Reply,
    server_info: ServerInfo,
    extended: bool,
    headers: Headers,
    span: tracing::Span,
}

impl Client<TcpStream> {
    /// Connects over plain TCP and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or the greeting is not 220.
    pub async fn connect(host: &str, port: u16, config: Config) -> Result<Self> {
        let stream = stream::connect(host, port, config.connect_timeout).await?;
        Self::from_stream(stream, host, config).await
    }

    /// Connects with implicit TLS and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or handshake fails or the greeting
    /// is not 220.
    pub async fn connect_tls(host: &str, port: u16, config: Config) -> Result<Self> {
        let connector = config.tls_connector();
        let stream = stream::connect_tls(host, port, &connector, config.connect_timeout).await?;
        Self::from_stream(stream, host, config).await
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a connected stream and reads the greeting.
    ///
    /// `host` is the server name used to verify its certificate on STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server does not
    /// greet with 220.
    pub async fn from_stream(stream: SmtpStream<S>, host: &str, config: Config) -> Result<Self> {
        let span = tracing::debug_span!("smtp_client", host = %host);
        let mut client = Self {
            stream,
            config,
            host: host.to_string(),
            welcome: Reply::new(ReplyCode::SERVICE_READY, Vec::new()),
            server_info: ServerInfo::default(),
            extended: false,
            headers: Headers::new(),
            span,
        };

        let greeting = client.read_reply().await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(Error::smtp_error(
                greeting.code.as_u16(),
                greeting.message_text(),
            ));
        }
        client.welcome = greeting;
        Ok(client)
    }

    /// Replaces the span the client logs under.
    #[must_use]
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Returns the text of the server greeting.
    #[must_use]
    pub fn welcome_message(&self) -> String {
        self.welcome.message_text()
    }

    /// Returns server identity and capabilities from the last hello.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns true if the last hello was EHLO.
    #[must_use]
    pub const fn is_extended(&self) -> bool {
        self.extended
    }

    /// Returns true if the connection is encrypted.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.stream.is_encrypted()
    }

    /// Greets the server with EHLO, falling back to HELO.
    ///
    /// When the server offers STARTTLS and the configuration allows it, the
    /// connection is upgraded and the greeting repeated. In opportunistic
    /// mode a refused STARTTLS leaves the session in plaintext.
    ///
    /// # Errors
    ///
    /// Returns an error if both greetings are rejected, the handshake fails,
    /// or TLS is required but the session is not encrypted.
    pub async fn hello(&mut self) -> Result<()> {
        loop {
            self.greet().await?;

            let wants_tls = self.config.security != Security::Disabled
                && !self.is_encrypted()
                && self.server_info.supports_starttls();
            if !wants_tls {
                break;
            }

            let reply = self.command(Command::StartTls).await?;
            if reply.code != ReplyCode::SERVICE_READY {
                if self.config.require_tls() {
                    return Err(starttls_refused(&reply));
                }
                tracing::warn!(
                    parent: &self.span,
                    code = %reply.code,
                    "STARTTLS refused, continuing without encryption"
                );
                break;
            }
            self.handshake().await?;
        }

        if self.config.require_tls() && !self.is_encrypted() {
            return Err(Error::TlsNegotiation(
                "Server does not offer STARTTLS".into(),
            ));
        }
        Ok(())
    }

    async fn greet(&mut self) -> Result<()> {
        let hostname = self.config.client_hostname.clone();

        let reply = self
            .command(Command::Ehlo {
                hostname: hostname.clone(),
            })
            .await?;
        if reply.code == ReplyCode::OK {
            self.extended = true;
            self.server_info = ServerInfo::from_hello(&reply.message);
            return Ok(());
        }

        tracing::debug!(parent: &self.span, code = %reply.code, "EHLO rejected, trying HELO");
        let reply = self.command(Command::Helo { hostname }).await?;
        let reply = expect_code(reply, ReplyCode::OK)?;
        self.extended = false;
        self.server_info = ServerInfo::from_hello(&reply.message);
        self.server_info.extensions.clear();
        Ok(())
    }

    /// Upgrades the connection with STARTTLS.
    ///
    /// Capabilities are cleared; call [`Client::hello`] again afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TlsNegotiation`] if the server refuses or the
    /// handshake fails.
    pub async fn starttls(&mut self) -> Result<()> {
        let reply = self.command(Command::StartTls).await?;
        if reply.code != ReplyCode::SERVICE_READY {
            return Err(starttls_refused(&reply));
        }
        self.handshake().await
    }

    async fn handshake(&mut self) -> Result<()> {
        let name = stream::server_name(&self.host)?;
        let connector = self.config.tls_connector();
        let plain = std::mem::replace(&mut self.stream, SmtpStream::Closed);
        self.stream = plain
            .upgrade_to_tls(&connector, name)
            .await
            .map_err(|e| Error::TlsNegotiation(e.to_string()))?;

        tracing::info!(parent: &self.span, "Connection upgraded to TLS");
        self.server_info = ServerInfo::default();
        self.extended = false;
        Ok(())
    }

    /// Starts a mail transaction and sets the `From` header.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the sender.
    pub async fn mail_from(&mut self, from: &Address) -> Result<()> {
        let reply = self
            .command(Command::MailFrom {
                from: from.clone(),
                body: None,
                size: None,
            })
            .await?;
        expect_code(reply, ReplyCode::OK)?;
        self.headers.set("from", from.to_string())?;
        Ok(())
    }

    /// Adds a visible recipient.
    ///
    /// The first recipient is listed in `To`, later ones in `Cc`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the recipient.
    pub async fn to(&mut self, recipient: &Address) -> Result<()> {
        self.rcpt(recipient).await?;
        let header = if self.headers.contains("to") { "cc" } else { "to" };
        self.headers.add(header, recipient.to_string())?;
        Ok(())
    }

    /// Adds a visible recipient. Same as [`Client::to`].
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the recipient.
    pub async fn cc(&mut self, recipient: &Address) -> Result<()> {
        self.to(recipient).await
    }

    /// Adds a recipient that is not listed in any header.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the recipient.
    pub async fn bcc(&mut self, recipient: &Address) -> Result<()> {
        self.rcpt(recipient).await
    }

    async fn rcpt(&mut self, recipient: &Address) -> Result<()> {
        let reply = self
            .command(Command::RcptTo {
                to: recipient.clone(),
            })
            .await?;
        expect_code(reply, ReplyCode::OK)?;
        Ok(())
    }

    /// Adds to the `Subject` header of the message being composed.
    pub fn subject(&mut self, subject: impl Into<String>) {
        // Static header name.
        let _ = self.headers.add("subject", subject);
    }

    /// Adds a header to the message being composed.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name is invalid.
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        self.headers.add(name, value)?;
        Ok(())
    }

    /// Removes a header from the message being composed.
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(name)
    }

    /// Asks the server whether it would accept an address.
    ///
    /// # Errors
    ///
    /// Returns an error on a syntax error reply (501) or transport failure.
    pub async fn verify(&mut self, address: &str) -> Result<bool> {
        let reply = self
            .command(Command::Vrfy {
                address: address.to_string(),
            })
            .await?;
        if reply.code == ReplyCode::PARAMETER_ERROR {
            return Err(Error::smtp_error(
                reply.code.as_u16(),
                reply.message_text(),
            ));
        }
        Ok(reply.is_success())
    }

    /// Sends NOOP.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not reply 250.
    pub async fn noop(&mut self) -> Result<()> {
        let reply = self.command(Command::Noop).await?;
        expect_code(reply, ReplyCode::OK)?;
        Ok(())
    }

    /// Aborts the current transaction and forgets composed headers.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not reply 250.
    pub async fn reset(&mut self) -> Result<()> {
        self.headers = Headers::new();
        let reply = self.command(Command::Rset).await?;
        expect_code(reply, ReplyCode::OK)?;
        Ok(())
    }

    /// Sends QUIT.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not reply 221.
    pub async fn quit(&mut self) -> Result<()> {
        let reply = self.command(Command::Quit).await?;
        expect_code(reply, ReplyCode::CLOSING)?;
        Ok(())
    }

    /// Writes several commands with a single flush and reads one reply per
    /// command, in order.
    ///
    /// Replies are returned as received, including rejections.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, timeout or a 421 reply.
    pub async fn pipeline(&mut self, commands: &[Command]) -> Result<Vec<Reply>> {
        let span = self.span.clone();
        self.write_pipelined(commands).instrument(span).await?;

        let mut replies = Vec::with_capacity(commands.len());
        for _ in commands {
            replies.push(self.read_reply().await?);
        }
        Ok(replies)
    }

    async fn write_pipelined(&mut self, commands: &[Command]) -> Result<()> {
        for command in commands {
            let data = command.serialize();
            tracing::debug!("> {}", String::from_utf8_lossy(&data).trim_end());
            self.stream.write(&data).await?;
        }
        self.stream.flush().await
    }

    /// Sends the composed headers and `content` as the message.
    ///
    /// Issues DATA, then writes the message and returns the final reply.
    ///
    /// # Errors
    ///
    /// Returns an error if DATA is refused or the message is rejected.
    pub async fn send(&mut self, content: &Content) -> Result<Reply> {
        let reply = self.command(Command::Data).await?;
        expect_code(reply, ReplyCode::START_DATA)?;
        self.send_data(content).await
    }

    /// Writes the message after DATA was accepted with 354.
    ///
    /// Use after [`Client::pipeline`] ended with DATA.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the message.
    pub async fn send_data(&mut self, content: &Content) -> Result<Reply> {
        let headers = std::mem::take(&mut self.headers);
        self.write_message(&headers, content).await
    }

    /// Runs a full MAIL/RCPT/DATA transaction for `mail`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mail has no content or any step is rejected.
    pub async fn send_mail(&mut self, mail: &Mail) -> Result<Reply> {
        self.transact(mail, mail.recipients()).await
    }

    /// Runs MAIL/RCPT/DATA for `mail` addressed to `recipients` only.
    pub(crate) async fn transact(&mut self, mail: &Mail, recipients: &[Address]) -> Result<Reply> {
        let content = mail
            .content()
            .ok_or_else(|| Error::InvalidState("Mail has no content".into()))?;

        let reply = self
            .command(Command::MailFrom {
                from: mail.sender().clone(),
                body: None,
                size: None,
            })
            .await?;
        expect_code(reply, ReplyCode::OK)?;

        for recipient in recipients {
            self.rcpt(recipient).await?;
        }

        let reply = self.command(Command::Data).await?;
        expect_code(reply, ReplyCode::START_DATA)?;
        self.write_message(mail.headers(), content).await
    }

    async fn write_message(&mut self, headers: &Headers, content: &Content) -> Result<Reply> {
        let mut headers = headers.clone();
        headers.set_default("date", rfc2822_now())?;
        headers.set_default("mime-version", "1.0")?;
        headers.remove("content-type");
        headers.remove("content-transfer-encoding");

        let mut message = headers.to_string();
        message.push_str(&content.encode());

        let span = self.span.clone();
        self.write_dot_stuffed(&message).instrument(span).await?;

        let reply = self.read_reply().await?;
        expect_code(reply, ReplyCode::OK)
    }

    /// Writes message lines, doubling a leading `.`, then the final `.` line.
    async fn write_dot_stuffed(&mut self, message: &str) -> Result<()> {
        for line in message.split("\r\n") {
            if line.starts_with('.') {
                self.stream.write(b".").await?;
            }
            self.stream.write(line.as_bytes()).await?;
            self.stream.write(b"\r\n").await?;
        }
        self.stream.write(b".\r\n").await?;
        self.stream.flush().await?;
        tracing::debug!(bytes = message.len(), "> message data");
        Ok(())
    }

    async fn command(&mut self, command: Command) -> Result<Reply> {
        let span = self.span.clone();
        self.exchange(command).instrument(span).await
    }

    async fn exchange(&mut self, command: Command) -> Result<Reply> {
        let data = command.serialize();
        tracing::debug!("> {}", String::from_utf8_lossy(&data).trim_end());
        self.stream.write_all(&data).await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let timeout = self.config.reply_timeout;
        let span = self.span.clone();
        let reply = tokio::time::timeout(timeout, self.read_reply_lines().instrument(span))
            .await
            .map_err(|_| Error::Timeout("server reply".into()))??;

        if reply.code == ReplyCode::SERVICE_UNAVAILABLE {
            return Err(Error::ServiceClosing(reply.message_text()));
        }
        Ok(reply)
    }

    async fn read_reply_lines(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let Some(line) = self.stream.read_line().await? else {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )));
            };
            tracing::debug!("< {line}");
            if line.is_empty() {
                continue;
            }

            let is_last = is_last_reply_line(&line);
            lines.push(line);

            if is_last {
                break;
            }
        }

        parse_reply(&lines)
    }
}

fn starttls_refused(reply: &Reply) -> Error {
    Error::TlsNegotiation(format!("{} {}", reply.code, reply.message_text()))
}

fn expect_code(reply: Reply, expected: ReplyCode) -> Result<Reply> {
    if reply.code == expected {
        Ok(reply)
    } else {
        Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use courier_mime::Text;
    use tokio_test::io::{Builder, Mock};

    fn config() -> Config {
        Config::builder().client_hostname("client.test").build()
    }

    async fn client(mock: Mock) -> Client<Mock> {
        Client::from_stream(SmtpStream::new(mock), "mx.test", config())
            .await
            .unwrap()
    }

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_greeting_is_recorded() {
        let mock = Builder::new().read("220 Wêlcömé\r\n".as_bytes()).build();
        let client = client(mock).await;
        assert_eq!(client.welcome_message(), "Wêlcömé");
        assert!(!client.is_encrypted());
    }

    #[tokio::test]
    async fn test_bad_greeting_fails() {
        let mock = Builder::new().read(b"554 Go away\r\n").build();
        let err = Client::from_stream(SmtpStream::new(mock), "mx.test", config())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Smtp { code: 554, .. }));
    }

    #[tokio::test]
    async fn test_greeting_421_is_service_closing() {
        let mock = Builder::new().read(b"421 Shutting down\r\n").build();
        let err = Client::from_stream(SmtpStream::new(mock), "mx.test", config())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServiceClosing(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_hello_records_capabilities() {
        let mock = Builder::new()
            .read(b"220 mx.test ESMTP\r\n")
            .write(b"EHLO client.test\r\n")
            .read(b"250-mx.test greets client.test\r\n250-PIPELINING\r\n250-SIZE 1000\r\n250 8BITMIME\r\n")
            .build();
        let mut client = client(mock).await;

        client.hello().await.unwrap();
        assert!(client.is_extended());
        assert_eq!(client.server_info().hostname, "mx.test greets client.test");
        assert!(client.server_info().supports_pipelining());
        assert_eq!(client.server_info().max_message_size(), Some(1000));
    }

    #[tokio::test]
    async fn test_hello_falls_back_to_helo() {
        let mock = Builder::new()
            .read(b"220 mx.test\r\n")
            .write(b"EHLO client.test\r\n")
            .read(b"502 Command not implemented\r\n")
            .write(b"HELO client.test\r\n")
            .read(b"250 mx.test\r\n")
            .build();
        let mut client = client(mock).await;

        client.hello().await.unwrap();
        assert!(!client.is_extended());
        assert_eq!(client.server_info().hostname, "mx.test");
        assert!(client.server_info().extensions.is_empty());
    }

    #[tokio::test]
    async fn test_hello_requires_tls() {
        let mock = Builder::new()
            .read(b"220 mx.test\r\n")
            .write(b"EHLO client.test\r\n")
            .read(b"250 mx.test\r\n")
            .build();
        let config = Config::builder()
            .client_hostname("client.test")
            .security(Security::Required)
            .build();
        let mut client = Client::from_stream(SmtpStream::new(mock), "mx.test", config)
            .await
            .unwrap();

        let err = client.hello().await.unwrap_err();
        assert!(matches!(err, Error::TlsNegotiation(_)));
    }

    #[tokio::test]
    async fn test_starttls_refused_stays_plaintext() {
        let mock = Builder::new()
            .read(b"220 mx.test\r\n")
            .write(b"EHLO client.test\r\n")
            .read(b"250-mx.test\r\n250 STARTTLS\r\n")
            .write(b"STARTTLS\r\n")
            .read(b"454 TLS not available\r\n")
            .build();
        let mut client = client(mock).await;

        client.hello().await.unwrap();
        assert!(!client.is_encrypted());
        assert!(client.is_extended());
    }

    #[tokio::test]
    async fn test_starttls_refused_when_required() {
        let mock = Builder::new()
            .read(b"220 mx.test\r\n")
            .write(b"EHLO client.test\r\n")
            .read(b"250-mx.test\r\n250 STARTTLS\r\n")
            .write(b"STARTTLS\r\n")
            .read(b"454 TLS not available\r\n")
            .build();
        let config = Config::builder()
            .client_hostname("client.test")
            .security(Security::Required)
            .build();
        let mut client = Client::from_stream(SmtpStream::new(mock), "mx.test", config)
            .await
            .unwrap();

        let err = client.hello().await.unwrap_err();
        assert!(matches!(err, Error::TlsNegotiation(_)));
    }

    #[tokio::test]
    async fn test_service_closing_mid_session() {
        let mock = Builder::new()
            .read(b"220 mx.test\r\n")
            .write(b"NOOP\r\n")
            .read(b"421 mx.test closing\r\n")
            .build();
        let mut client = client(mock).await;

        let err = client.noop().await.unwrap_err();
        assert!(matches!(err, Error::ServiceClosing(ref text) if text == "mx.test closing"));
    }

    #[tokio::test]
    async fn test_eof_is_error() {
        let mock = Builder::new()
            .read(b"220 mx.test\r\n")
            .write(b"NOOP\r\n")
            .build();
        let mut client = client(mock).await;

        let err = client.noop().await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_verify() {
        let mock = Builder::new()
            .read(b"220 mx.test\r\n")
            .write(b"VRFY user@mx.test\r\n")
            .read(b"250 user@mx.test\r\n")
            .write(b"VRFY denied@mx.test\r\n")
            .read(b"553 Rejected\r\n")
            .write(b"VRFY bogus\r\n")
            .read(b"501 Syntax\r\n")
            .build();
        let mut client = client(mock).await;

        assert!(client.verify("user@mx.test").await.unwrap());
        assert!(!client.verify("denied@mx.test").await.unwrap());
        assert!(client.verify("bogus").await.is_err());
    }

    #[tokio::test]
    async fn test_pipeline_replies_in_order() {
        let mock = Builder::new()
            .read(b"220 mx.test\r\n")
            .write(b"MAIL FROM:<a@mx.test>\r\nRCPT TO:<b@mx.test>\r\nRCPT TO:<denied@mx.test>\r\nDATA\r\n")
            .read(b"250 OK\r\n250 OK\r\n553 Denied\r\n354 Go ahead\r\n")
            .build();
        let mut client = client(mock).await;

        let replies = client
            .pipeline(&[
                Command::MailFrom {
                    from: addr("a@mx.test"),
                    body: None,
                    size: None,
                },
                Command::RcptTo {
                    to: addr("b@mx.test"),
                },
                Command::RcptTo {
                    to: addr("denied@mx.test"),
                },
                Command::Data,
            ])
            .await
            .unwrap();

        let codes: Vec<u16> = replies.iter().map(|r| r.code.as_u16()).collect();
        assert_eq!(codes, vec![250, 250, 553, 354]);
    }

    #[tokio::test]
    async fn test_send_dot_stuffs_body() {
        let mut mock = Builder::new();
        mock.read(b"220 mx.test\r\n")
            .write(b"MAIL FROM:<a@mx.test>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<b@mx.test>\r\n")
            .read(b"250 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 Go ahead\r\n");

        let date = "Mon, 1 Jan 2024 00:00:00 +0000";
        let expected = format!(
            "Date: {date}\r\nFrom: a@mx.test\r\nMime-Version: 1.0\r\nSubject: Dots\r\nTo: b@mx.test\r\n\
             Content-Type: text/plain; charset=\"UTF-8\"\r\n\
             Content-Transfer-Encoding: quoted-printable\r\n\
             \r\n\
             ..\r\n\
             ..leading\r\n\
             \r\n\
             .\r\n"
        );
        mock.write(expected.as_bytes()).read(b"250 Queued\r\n");
        let mut client = client(mock.build()).await;

        client.mail_from(&addr("a@mx.test")).await.unwrap();
        client.to(&addr("b@mx.test")).await.unwrap();
        client.subject("Dots");
        client.add_header("Date", date).unwrap();
        client.add_header("Content-Type", "text/html").unwrap();

        let reply = client.send(&Content::from(Text::plain(".\r\n.leading\r\n"))).await.unwrap();
        assert_eq!(reply.message_text(), "Queued");
    }

    #[tokio::test]
    async fn test_subject_accumulates() {
        let mock = Builder::new().read(b"220 mx.test\r\n").build();
        let mut client = client(mock).await;

        client.subject("Status");
        client.subject("weekly");
        assert_eq!(client.headers.get("subject"), Some("Status, weekly"));
    }

    #[tokio::test]
    async fn test_send_mail_rejected_recipient() {
        let mock = Builder::new()
            .read(b"220 mx.test\r\n")
            .write(b"MAIL FROM:<a@mx.test>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<denied@mx.test>\r\n")
            .read(b"553 Denied\r\n")
            .build();
        let mut client = client(mock).await;

        let mail = Mail::compose(addr("a@mx.test"))
            .to(addr("denied@mx.test"))
            .with_content(Text::plain("Hello"));
        let err = client.send_mail(&mail).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_quit() {
        let mock = Builder::new()
            .read(b"220 mx.test\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 Bye\r\n")
            .build();
        let mut client = client(mock).await;
        client.quit().await.unwrap();
    }
}
