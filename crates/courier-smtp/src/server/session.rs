//! Per-connection SMTP state machine.

use super::policy::{Policy, SessionInfo};
use super::transport::Transport;
use crate::command::Command;
use crate::error::Result;
use crate::framing::Line;
use crate::mail::{Mail, rfc2822_now};
use crate::types::{Address, Reply, ReplyCode};
use courier_mime::{Content, HeaderReader, Headers};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;

/// Settings shared by every session of a server.
pub(crate) struct SessionContext {
    pub(crate) policy: Arc<dyn Policy>,
    pub(crate) tls: Option<TlsAcceptor>,
    pub(crate) max_line_length: usize,
}

/// Where the client is in the command sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unidentified,
    Identified,
    MailOpen,
    RecipientsOpen,
}

/// Why the command loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    /// 220 was sent for STARTTLS; the handshake comes next.
    StartTls,
    Quit,
    /// The peer closed the connection or sent an oversized line.
    Closed,
    /// The server is shutting down; 421 was sent.
    Shutdown,
}

/// What the next read produced.
enum Incoming {
    Line(String),
    Exit(LoopExit),
}

/// One client connection, from greeting to close.
pub(crate) struct Session<S> {
    transport: Transport<S>,
    info: SessionInfo,
    mail: Option<Mail>,
    context: Arc<SessionContext>,
    shutdown: watch::Receiver<bool>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(
        stream: S,
        peer: std::net::SocketAddr,
        context: Arc<SessionContext>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            transport: Transport::new(stream),
            info: SessionInfo::new(peer),
            mail: None,
            context,
            shutdown,
        }
    }

    /// Serves the connection until it ends.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures; protocol errors are
    /// answered with replies.
    pub(crate) async fn run(mut self) -> Result<()> {
        let welcome = self.context.policy.welcome_message(&self.info);
        self.reply(&Reply::single(ReplyCode::SERVICE_READY, welcome))
            .await?;

        loop {
            match self.serve().await? {
                LoopExit::StartTls => {
                    if !self.start_tls().await {
                        break;
                    }
                }
                LoopExit::Quit | LoopExit::Closed | LoopExit::Shutdown => break,
            }
        }

        if let Err(e) = self.transport.shutdown().await {
            tracing::debug!(error = %e, "Connection shutdown failed");
        }
        tracing::debug!("Session closed");
        Ok(())
    }

    fn phase(&self) -> Phase {
        match (&self.info.hostname, &self.mail) {
            (None, _) => Phase::Unidentified,
            (Some(_), None) => Phase::Identified,
            (Some(_), Some(mail)) if mail.recipients().is_empty() => Phase::MailOpen,
            (Some(_), Some(_)) => Phase::RecipientsOpen,
        }
    }

    fn reset(&mut self) {
        self.info.hostname = None;
        self.info.extended = false;
        self.mail = None;
    }

    async fn serve(&mut self) -> Result<LoopExit> {
        loop {
            let line = match self.next_line().await? {
                Incoming::Line(line) => line,
                Incoming::Exit(exit) => return Ok(exit),
            };

            if let Some(exit) = self.handle(&line).await? {
                return Ok(exit);
            }
        }
    }

    /// Reads a line, racing the shutdown signal.
    async fn next_line(&mut self) -> Result<Incoming> {
        let max_length = self.context.max_line_length;
        let line = tokio::select! {
            line = self.transport.read_line(max_length) => line?,
            () = closing(&mut self.shutdown) => {
                self.reply(&Reply::single(
                    ReplyCode::SERVICE_UNAVAILABLE,
                    "Server shutting down",
                ))
                .await?;
                return Ok(Incoming::Exit(LoopExit::Shutdown));
            }
        };

        match line {
            Line::Complete(line) => {
                tracing::debug!("> {line}");
                Ok(Incoming::Line(line))
            }
            Line::TooLong => {
                self.reply(&Reply::single(ReplyCode::SYNTAX_ERROR, "Line too long"))
                    .await?;
                Ok(Incoming::Exit(LoopExit::Closed))
            }
            Line::Eof => {
                tracing::debug!("Connection closed by client");
                Ok(Incoming::Exit(LoopExit::Closed))
            }
        }
    }

    async fn handle(&mut self, line: &str) -> Result<Option<LoopExit>> {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                let verb = line.split_whitespace().next().unwrap_or_default();
                let reply = self
                    .sequence_error(verb)
                    .unwrap_or_else(|| e.to_reply());
                self.reply(&reply).await?;
                return Ok(None);
            }
        };

        let reply = match command {
            Command::Helo { hostname } => self.hello(hostname, false),
            Command::Ehlo { hostname } => self.hello(hostname, true),
            Command::Noop => ok(),
            Command::Rset => {
                self.reset();
                ok()
            }
            Command::Quit => {
                self.reply(&Reply::single(ReplyCode::CLOSING, "Bye"))
                    .await?;
                return Ok(Some(LoopExit::Quit));
            }
            Command::Help => not_implemented(),
            Command::StartTls => {
                let reply = self.starttls_reply();
                let accepted = reply.code == ReplyCode::SERVICE_READY;
                self.reply(&reply).await?;
                return Ok(accepted.then_some(LoopExit::StartTls));
            }
            Command::MailFrom { from, size, .. } => self.mail_from(from, size),
            Command::RcptTo { to } => self.rcpt_to(to),
            Command::Vrfy { address } => self.verify(&address),
            Command::Data => return self.data().await,
        };

        self.reply(&reply).await?;
        Ok(None)
    }

    fn hello(&mut self, hostname: String, extended: bool) -> Reply {
        self.info.hostname = Some(hostname);
        self.info.extended = extended;
        self.mail = None;

        let policy = &self.context.policy;
        let mut lines = vec![policy.hostname(&self.info)];
        if extended {
            lines.push("PIPELINING".into());
            if self.context.tls.is_some() && !self.info.encrypted {
                lines.push("STARTTLS".into());
            }
            if let Some(limit) = policy.size_limit(&self.info) {
                lines.push(format!("SIZE {limit}"));
            }
            if policy.is_vrfy_allowed(&self.info) {
                lines.push("VRFY".into());
            }
            lines.push("8BITMIME".into());
            lines.push("SMTPUTF8".into());
        }
        Reply::new(ReplyCode::OK, lines)
    }

    fn starttls_reply(&self) -> Reply {
        if self.info.encrypted {
            Reply::single(ReplyCode::TLS_NOT_AVAILABLE, "TLS already active")
        } else if self.context.tls.is_none() {
            not_implemented()
        } else if self.phase() == Phase::Unidentified {
            hello_first()
        } else {
            Reply::single(ReplyCode::SERVICE_READY, "Ready to start TLS")
        }
    }

    /// Runs the handshake after STARTTLS. Returns false if the connection
    /// must be dropped.
    async fn start_tls(&mut self) -> bool {
        let Some(acceptor) = self.context.tls.clone() else {
            return false;
        };

        let transport = std::mem::replace(&mut self.transport, Transport::Closed);
        let upgraded = transport.upgrade(&acceptor).await;
        self.reset();

        match upgraded {
            Ok(transport) => {
                self.transport = transport;
                self.info.encrypted = self.transport.is_encrypted();
                tracing::debug!("TLS established");
                true
            }
            Err((e, plain)) => {
                tracing::warn!(error = %e, "TLS handshake failed");
                if self.context.policy.is_encryption_required(&self.info) {
                    return false;
                }
                self.transport = plain;
                true
            }
        }
    }

    /// Sequence error for a MAIL or RCPT verb in the current phase. Checked
    /// before argument errors are reported.
    fn sequence_error(&self, verb: &str) -> Option<Reply> {
        if verb.eq_ignore_ascii_case("MAIL") {
            match self.phase() {
                Phase::Unidentified => Some(hello_first()),
                Phase::MailOpen | Phase::RecipientsOpen => {
                    Some(bad_sequence("Sender already specified"))
                }
                Phase::Identified => None,
            }
        } else if verb.eq_ignore_ascii_case("RCPT") && self.mail.is_none() {
            Some(bad_sequence("Send MAIL first"))
        } else {
            None
        }
    }

    fn mail_from(&mut self, from: Address, size: Option<usize>) -> Reply {
        if let Some(reply) = self.sequence_error("MAIL") {
            return reply;
        }

        let policy = &self.context.policy;
        if !self.info.encrypted && policy.is_encryption_required(&self.info) {
            return bad_sequence("Encryption required, send STARTTLS first");
        }
        if !policy.is_sender_accepted(&self.info, &from) {
            return Reply::single(ReplyCode::MAILBOX_NAME_INVALID, "Sender not accepted");
        }
        if let (Some(limit), Some(size)) = (policy.size_limit(&self.info), size) {
            if size > limit {
                return exceeded_storage(limit);
            }
        }

        self.mail = Some(Mail::new(from));
        ok()
    }

    fn rcpt_to(&mut self, to: Address) -> Reply {
        let Some(mail) = self.mail.as_mut() else {
            return bad_sequence("Send MAIL first");
        };

        if !self.context.policy.is_recipient_accepted(&self.info, &to) {
            return Reply::single(
                ReplyCode::MAILBOX_NAME_INVALID,
                format!("Cannot deliver to {to}"),
            );
        }

        mail.push_recipient(to);
        ok()
    }

    fn verify(&self, address: &str) -> Reply {
        if self.phase() == Phase::Unidentified {
            return hello_first();
        }
        if !self.context.policy.is_vrfy_allowed(&self.info) {
            return not_implemented();
        }

        match Address::parse(address) {
            Ok(address) if self.context.policy.is_recipient_accepted(&self.info, &address) => {
                Reply::single(ReplyCode::OK, format!("Can deliver to {address}"))
            }
            Ok(address) => Reply::single(
                ReplyCode::MAILBOX_NAME_INVALID,
                format!("Cannot deliver to {address}"),
            ),
            Err(_) => Reply::single(
                ReplyCode::MAILBOX_NAME_INVALID,
                format!("{address} is not a valid address"),
            ),
        }
    }

    async fn data(&mut self) -> Result<Option<LoopExit>> {
        let reply = match self.phase() {
            Phase::Unidentified => Some(hello_first()),
            Phase::Identified => Some(bad_sequence("Send MAIL first")),
            Phase::MailOpen => Some(bad_sequence("Send RCPT first")),
            Phase::RecipientsOpen => None,
        };
        if let Some(reply) = reply {
            self.reply(&reply).await?;
            return Ok(None);
        }

        self.reply(&Reply::single(
            ReplyCode::START_DATA,
            "Start mail input; end with <CRLF>.<CRLF>",
        ))
        .await?;

        let limit = self.context.policy.size_limit(&self.info);
        let mut capture = Capture::new(limit);
        loop {
            match self.next_line().await? {
                Incoming::Line(line) if line == "." => break,
                Incoming::Line(line) => {
                    let line = line.strip_prefix('.').unwrap_or(&line);
                    capture.push(line);
                }
                Incoming::Exit(exit) => {
                    self.mail = None;
                    return Ok(Some(exit));
                }
            }
        }

        let reply = match self.mail.take() {
            Some(mail) => self.complete(mail, capture),
            None => bad_sequence("Send MAIL first"),
        };
        self.reply(&reply).await?;
        Ok(None)
    }

    /// Turns captured DATA into content and hands the mail over.
    fn complete(&self, mut mail: Mail, capture: Capture) -> Reply {
        if let Some(limit) = capture.exceeded() {
            return exceeded_storage(limit);
        }

        let (mut headers, body) = capture.finish();
        if body.is_empty() {
            return Reply::single(ReplyCode::TRANSACTION_FAILED, "No message body");
        }

        let content = match Content::decode(&headers, &body) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(error = %e, "Message content rejected");
                return Reply::single(
                    ReplyCode::TRANSACTION_FAILED,
                    format!("Invalid message content: {e}"),
                );
            }
        };
        let _ = headers.set_default("date", rfc2822_now());
        mail.set_message(headers, content);

        let recipients = mail.recipients().len();
        if self.context.policy.on_mail_composed(&self.info, mail) {
            tracing::info!(recipients, "Mail accepted");
            ok()
        } else {
            Reply::single(ReplyCode::TRANSACTION_FAILED, "Mail refused")
        }
    }

    async fn reply(&mut self, reply: &Reply) -> Result<()> {
        let wire = reply.to_wire();
        for line in wire.lines() {
            tracing::debug!("< {line}");
        }
        self.transport.write_all(wire.as_bytes()).await?;
        Ok(())
    }
}

/// Accumulates the lines of a DATA section.
struct Capture {
    headers: Option<HeaderReader>,
    parsed: Headers,
    body: Vec<String>,
    size: usize,
    limit: Option<usize>,
    exceeded: bool,
}

impl Capture {
    fn new(limit: Option<usize>) -> Self {
        Self {
            headers: Some(HeaderReader::new()),
            parsed: Headers::new(),
            body: Vec::new(),
            size: 0,
            limit,
            exceeded: false,
        }
    }

    fn push(&mut self, line: &str) {
        if self.exceeded {
            return;
        }

        self.size += line.len() + 2;
        if self.limit.is_some_and(|limit| self.size > limit) {
            self.exceeded = true;
            self.body.clear();
            return;
        }

        let Some(reader) = self.headers.as_mut() else {
            self.body.push(line.to_string());
            return;
        };

        if line.is_empty() {
            self.end_headers();
        } else if !reader.feed(line) {
            self.end_headers();
            self.body.push(line.to_string());
        }
    }

    fn end_headers(&mut self) {
        if let Some(reader) = self.headers.take() {
            self.parsed = reader.finish();
        }
    }

    /// Returns the limit if the captured data went over it.
    fn exceeded(&self) -> Option<usize> {
        self.limit.filter(|_| self.exceeded)
    }

    fn finish(mut self) -> (Headers, String) {
        self.end_headers();
        (self.parsed, self.body.join("\r\n"))
    }
}

/// Resolves once shutdown is signalled. Never resolves if the server is gone.
async fn closing(shutdown: &mut watch::Receiver<bool>) {
    let sender_gone = shutdown.wait_for(|closing| *closing).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}

fn ok() -> Reply {
    Reply::single(ReplyCode::OK, "OK")
}

fn not_implemented() -> Reply {
    Reply::single(ReplyCode::NOT_IMPLEMENTED, "Command not implemented")
}

fn bad_sequence(text: &str) -> Reply {
    Reply::single(ReplyCode::BAD_SEQUENCE, text)
}

fn hello_first() -> Reply {
    bad_sequence("Send HELO or EHLO first")
}

fn exceeded_storage(limit: usize) -> Reply {
    Reply::single(
        ReplyCode::EXCEEDED_STORAGE,
        format!("Message exceeds the size limit of {limit} bytes"),
    )
}
