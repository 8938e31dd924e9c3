//! SMTP replies, as read by the client and written by the session.

use std::fmt;

/// A reply: one code and one or more text lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code.
    pub code: ReplyCode,
    /// Text lines, without code prefixes.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a reply from its lines.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Creates a one-line reply.
    #[must_use]
    pub fn single(code: ReplyCode, text: impl Into<String>) -> Self {
        Self::new(code, vec![text.into()])
    }

    /// True for 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Joins the lines with `\n`.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Renders the reply for the wire.
    ///
    /// Every line but the last uses `code-text`, the last `code text`.
    #[must_use]
    pub fn to_wire(&self) -> String {
        let code = self.code;
        let Some(last) = self.message.len().checked_sub(1) else {
            return format!("{code}\r\n");
        };

        self.message
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let separator = if i == last { ' ' } else { '-' };
                format!("{code}{separator}{line}\r\n")
            })
            .collect()
    }
}

/// Three-digit reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220, greeting and STARTTLS go-ahead.
    pub const SERVICE_READY: Self = Self(220);
    /// 221, reply to QUIT.
    pub const CLOSING: Self = Self(221);
    /// 250
    pub const OK: Self = Self(250);
    /// 354, go ahead with DATA.
    pub const START_DATA: Self = Self(354);
    /// 421, the server is closing the channel.
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 454
    pub const TLS_NOT_AVAILABLE: Self = Self(454);
    /// 500, unrecognized command or line too long.
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 501
    pub const PARAMETER_ERROR: Self = Self(501);
    /// 502
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// 503
    pub const BAD_SEQUENCE: Self = Self(503);
    /// 552, message over the size limit.
    pub const EXCEEDED_STORAGE: Self = Self(552);
    /// 553, address refused or malformed.
    pub const MAILBOX_NAME_INVALID: Self = Self(553);
    /// 554
    pub const TRANSACTION_FAILED: Self = Self(554);

    /// Wraps a numeric code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// True for 2xx.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        assert!(ReplyCode::SERVICE_READY.is_success());
        assert!(ReplyCode::CLOSING.is_success());
        assert!(!ReplyCode::START_DATA.is_success());
        assert!(!Reply::single(ReplyCode::SERVICE_UNAVAILABLE, "Bye").is_success());
    }

    #[test]
    fn test_display_and_order() {
        assert_eq!(ReplyCode::EXCEEDED_STORAGE.to_string(), "552");
        assert!(ReplyCode::TLS_NOT_AVAILABLE < ReplyCode::SYNTAX_ERROR);
    }

    #[test]
    fn test_message_text_joins_lines() {
        let reply = Reply::new(
            ReplyCode::SERVICE_READY,
            vec!["mx.example.com ESMTP".into(), "Ready".into()],
        );
        assert_eq!(reply.message_text(), "mx.example.com ESMTP\nReady");
    }

    #[test]
    fn test_to_wire() {
        assert_eq!(Reply::single(ReplyCode::CLOSING, "Bye").to_wire(), "221 Bye\r\n");
        assert_eq!(Reply::new(ReplyCode::OK, vec![]).to_wire(), "250\r\n");

        let ehlo = Reply::new(
            ReplyCode::OK,
            vec!["mx.example.com".into(), "PIPELINING".into(), "8BITMIME".into()],
        );
        assert_eq!(
            ehlo.to_wire(),
            "250-mx.example.com\r\n250-PIPELINING\r\n250 8BITMIME\r\n"
        );
    }
}
