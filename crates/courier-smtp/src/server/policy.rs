//! Embedder hooks that decide what the server accepts.

use crate::mail::Mail;
use crate::types::Address;
use std::net::SocketAddr;

/// Connection state visible to a [`Policy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub(crate) peer: SocketAddr,
    pub(crate) hostname: Option<String>,
    pub(crate) extended: bool,
    pub(crate) encrypted: bool,
}

impl SessionInfo {
    pub(crate) const fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            hostname: None,
            extended: false,
            encrypted: false,
        }
    }

    /// Returns the remote address.
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Returns the hostname the client identified with, if it did.
    #[must_use]
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Returns true if the client identified with EHLO.
    #[must_use]
    pub const fn is_extended(&self) -> bool {
        self.extended
    }

    /// Returns true if the connection is encrypted.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.encrypted
    }
}

/// Decisions and delivery for an SMTP server.
///
/// Only [`hostname`](Policy::hostname) and
/// [`on_mail_composed`](Policy::on_mail_composed) are required; every other
/// hook accepts by default.
///
/// Hooks run on the session task and should not block.
///
/// # Example
///
/// ```
/// use courier_smtp::server::{Policy, SessionInfo};
/// use courier_smtp::Mail;
///
/// struct Sink;
///
/// impl Policy for Sink {
///     fn hostname(&self, _session: &SessionInfo) -> String {
///         "mx.example.com".into()
///     }
///
///     fn on_mail_composed(&self, _session: &SessionInfo, mail: Mail) -> bool {
///         println!("mail from {}", mail.sender());
///         true
///     }
/// }
/// ```
pub trait Policy: Send + Sync + 'static {
    /// Whether to serve a new connection. Refused connections are closed
    /// without a greeting.
    fn is_connection_accepted(&self, peer: SocketAddr) -> bool {
        let _ = peer;
        true
    }

    /// Text of the 220 greeting.
    fn welcome_message(&self, session: &SessionInfo) -> String {
        format!("Welcome to {}", self.hostname(session))
    }

    /// Hostname the server announces in HELO/EHLO replies.
    fn hostname(&self, session: &SessionInfo) -> String;

    /// Whether MAIL is refused until the connection is encrypted.
    ///
    /// Also decides whether a failed TLS handshake drops the connection.
    fn is_encryption_required(&self, session: &SessionInfo) -> bool {
        let _ = session;
        false
    }

    /// Maximum accepted message size in bytes, advertised as `SIZE`.
    fn size_limit(&self, session: &SessionInfo) -> Option<usize> {
        let _ = session;
        None
    }

    /// Whether VRFY is answered.
    fn is_vrfy_allowed(&self, session: &SessionInfo) -> bool {
        let _ = session;
        true
    }

    /// Whether a sender is accepted in MAIL FROM.
    fn is_sender_accepted(&self, session: &SessionInfo, sender: &Address) -> bool {
        let _ = (session, sender);
        true
    }

    /// Whether a recipient is accepted in RCPT TO and VRFY.
    fn is_recipient_accepted(&self, session: &SessionInfo, recipient: &Address) -> bool {
        let _ = (session, recipient);
        true
    }

    /// Takes a completed mail. Returning `false` refuses it with 554.
    fn on_mail_composed(&self, session: &SessionInfo, mail: Mail) -> bool;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Minimal;

    impl Policy for Minimal {
        fn hostname(&self, _session: &SessionInfo) -> String {
            "mx.example.com".into()
        }

        fn on_mail_composed(&self, _session: &SessionInfo, _mail: Mail) -> bool {
            true
        }
    }

    #[test]
    fn test_defaults_accept() {
        let session = SessionInfo::new("127.0.0.1:2525".parse().unwrap());
        let address = Address::new("user@example.com").unwrap();
        let policy = Minimal;

        assert!(policy.is_connection_accepted(session.peer()));
        assert_eq!(policy.welcome_message(&session), "Welcome to mx.example.com");
        assert!(!policy.is_encryption_required(&session));
        assert_eq!(policy.size_limit(&session), None);
        assert!(policy.is_vrfy_allowed(&session));
        assert!(policy.is_sender_accepted(&session, &address));
        assert!(policy.is_recipient_accepted(&session, &address));
    }

    #[test]
    fn test_session_info_starts_unidentified() {
        let session = SessionInfo::new("[::1]:25".parse().unwrap());
        assert_eq!(session.hostname(), None);
        assert!(!session.is_extended());
        assert!(!session.is_encrypted());
    }
}
