//! SMTP commands.
//!
//! The client serializes [`Command`] values onto the wire; the server session
//! recovers them from received lines with [`Command::parse`].

use crate::types::{Address, Reply, ReplyCode};

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Simple greeting
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address
        from: Address,
        /// BODY parameter (7BIT, 8BITMIME)
        body: Option<String>,
        /// SIZE parameter
        size: Option<usize>,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
    },
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// VRFY - Verify address
    Vrfy {
        /// Address to verify
        address: String,
    },
    /// NOOP - No operation
    Noop,
    /// QUIT - Close connection
    Quit,
    /// HELP - Request help text
    Help,
}

/// Reasons a received command line is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Unknown command verb.
    #[error("Command not recognized: {0}")]
    Unrecognized(String),

    /// Known command with malformed arguments.
    #[error("Syntax: {0}")]
    Syntax(&'static str),

    /// `SIZE=` parameter that is not a number.
    #[error("Invalid SIZE parameter: {0}")]
    InvalidSize(String),

    /// Address argument that is not a valid mailbox.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl ParseError {
    /// Returns the reply the server sends for this error.
    #[must_use]
    pub fn to_reply(&self) -> Reply {
        match self {
            Self::Unrecognized(_) => {
                Reply::single(ReplyCode::SYNTAX_ERROR, "Command not recognized")
            }
            Self::Syntax(usage) => Reply::single(ReplyCode::PARAMETER_ERROR, format!("Syntax: {usage}")),
            Self::InvalidSize(_) => {
                Reply::single(ReplyCode::PARAMETER_ERROR, "Invalid SIZE parameter")
            }
            Self::InvalidAddress(_) => {
                Reply::single(ReplyCode::MAILBOX_NAME_INVALID, "Invalid address")
            }
        }
    }
}

impl Command {
    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::Helo { hostname } => {
                buf.extend_from_slice(b"HELO ");
                buf.extend_from_slice(hostname.as_bytes());
            }
            Self::Ehlo { hostname } => {
                buf.extend_from_slice(b"EHLO ");
                buf.extend_from_slice(hostname.as_bytes());
            }
            Self::StartTls => {
                buf.extend_from_slice(b"STARTTLS");
            }
            Self::MailFrom { from, body, size } => {
                buf.extend_from_slice(b"MAIL FROM:<");
                buf.extend_from_slice(from.mailbox().as_bytes());
                buf.push(b'>');
                if let Some(body_type) = body {
                    buf.extend_from_slice(b" BODY=");
                    buf.extend_from_slice(body_type.as_bytes());
                }
                if let Some(msg_size) = size {
                    buf.extend_from_slice(format!(" SIZE={msg_size}").as_bytes());
                }
            }
            Self::RcptTo { to } => {
                buf.extend_from_slice(b"RCPT TO:<");
                buf.extend_from_slice(to.mailbox().as_bytes());
                buf.push(b'>');
            }
            Self::Data => {
                buf.extend_from_slice(b"DATA");
            }
            Self::Rset => {
                buf.extend_from_slice(b"RSET");
            }
            Self::Vrfy { address } => {
                buf.extend_from_slice(b"VRFY ");
                buf.extend_from_slice(address.as_bytes());
            }
            Self::Noop => {
                buf.extend_from_slice(b"NOOP");
            }
            Self::Quit => {
                buf.extend_from_slice(b"QUIT");
            }
            Self::Help => {
                buf.extend_from_slice(b"HELP");
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Parses a received command line (without CRLF).
    ///
    /// The verb is matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] describing why the line was rejected.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));

        match verb.to_ascii_uppercase().as_str() {
            "HELO" => Ok(Self::Helo {
                hostname: single_argument(rest).ok_or(ParseError::Syntax("HELO <hostname>"))?,
            }),
            "EHLO" => Ok(Self::Ehlo {
                hostname: single_argument(rest).ok_or(ParseError::Syntax("EHLO <hostname>"))?,
            }),
            "MAIL" => {
                let path = strip_prefix_ignore_case(rest, "FROM:")
                    .ok_or(ParseError::Syntax("MAIL FROM:<address> [SIZE=n] [BODY=type]"))?;
                let (from, params) = parse_path(path)?;

                let mut size = None;
                let mut body = None;
                for param in params.split_whitespace() {
                    if let Some(value) = strip_prefix_ignore_case(param, "SIZE=") {
                        size = Some(parse_size(value)?);
                    } else if let Some(value) = strip_prefix_ignore_case(param, "BODY=") {
                        body = Some(value.to_ascii_uppercase());
                    }
                }

                Ok(Self::MailFrom { from, body, size })
            }
            "RCPT" => {
                let path = strip_prefix_ignore_case(rest, "TO:")
                    .ok_or(ParseError::Syntax("RCPT TO:<address>"))?;
                let (to, _) = parse_path(path)?;
                Ok(Self::RcptTo { to })
            }
            "VRFY" => {
                if rest.is_empty() {
                    return Err(ParseError::Syntax("VRFY <address>"));
                }
                Ok(Self::Vrfy {
                    address: rest.to_string(),
                })
            }
            "DATA" => Ok(Self::Data),
            "RSET" => Ok(Self::Rset),
            "NOOP" => Ok(Self::Noop),
            "QUIT" => Ok(Self::Quit),
            "STARTTLS" => Ok(Self::StartTls),
            "HELP" => Ok(Self::Help),
            _ => Err(ParseError::Unrecognized(verb.to_string())),
        }
    }
}

/// Parses a `SIZE=` value. Digits too large for `usize` saturate, so an
/// oversized declaration still compares greater than any limit.
fn parse_size(value: &str) -> Result<usize, ParseError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidSize(value.to_string()));
    }
    Ok(value.parse().unwrap_or(usize::MAX))
}

fn single_argument(rest: &str) -> Option<String> {
    let mut args = rest.split_whitespace();
    match (args.next(), args.next()) {
        (Some(arg), None) => Some(arg.to_string()),
        _ => None,
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

/// Splits `<address> params` (or `address params`) into a mailbox and the
/// remaining parameter text.
fn parse_path(path: &str) -> Result<(Address, &str), ParseError> {
    let path = path.trim_start();
    let (mailbox, params) = if let Some(inner) = path.strip_prefix('<') {
        let end = inner
            .find('>')
            .ok_or_else(|| ParseError::InvalidAddress(path.to_string()))?;
        (&inner[..end], &inner[end + 1..])
    } else {
        path.split_once(char::is_whitespace).unwrap_or((path, ""))
    };

    let address =
        Address::new(mailbox).map_err(|_| ParseError::InvalidAddress(mailbox.to_string()))?;
    Ok((address, params))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    mod serialize_tests {
        use super::*;

        #[test]
        fn test_helo_command() {
            let cmd = Command::Helo {
                hostname: "client.example.com".to_string(),
            };
            assert_eq!(cmd.serialize(), b"HELO client.example.com\r\n");
        }

        #[test]
        fn test_ehlo_command() {
            let cmd = Command::Ehlo {
                hostname: "client.example.com".to_string(),
            };
            assert_eq!(cmd.serialize(), b"EHLO client.example.com\r\n");
        }

        #[test]
        fn test_starttls_command() {
            assert_eq!(Command::StartTls.serialize(), b"STARTTLS\r\n");
        }

        #[test]
        fn test_mail_from_simple() {
            let cmd = Command::MailFrom {
                from: Address::new("sender@example.com").unwrap(),
                body: None,
                size: None,
            };
            assert_eq!(cmd.serialize(), b"MAIL FROM:<sender@example.com>\r\n");
        }

        #[test]
        fn test_mail_from_with_params() {
            let cmd = Command::MailFrom {
                from: Address::with_name("Sender", "sender@example.com").unwrap(),
                body: Some("8BITMIME".to_string()),
                size: Some(12345),
            };
            assert_eq!(
                cmd.serialize(),
                b"MAIL FROM:<sender@example.com> BODY=8BITMIME SIZE=12345\r\n"
            );
        }

        #[test]
        fn test_rcpt_to_command() {
            let cmd = Command::RcptTo {
                to: Address::new("recipient@example.com").unwrap(),
            };
            assert_eq!(cmd.serialize(), b"RCPT TO:<recipient@example.com>\r\n");
        }

        #[test]
        fn test_simple_commands() {
            assert_eq!(Command::Data.serialize(), b"DATA\r\n");
            assert_eq!(Command::Rset.serialize(), b"RSET\r\n");
            assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
            assert_eq!(Command::Noop.serialize(), b"NOOP\r\n");
            assert_eq!(Command::Help.serialize(), b"HELP\r\n");
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn parse_ehlo_case_insensitive() {
            assert_eq!(
                Command::parse("ehlo client.example.com").unwrap(),
                Command::Ehlo {
                    hostname: "client.example.com".to_string()
                }
            );
        }

        #[test]
        fn parse_helo_requires_one_argument() {
            assert_eq!(
                Command::parse("HELO").unwrap_err(),
                ParseError::Syntax("HELO <hostname>")
            );
            assert!(Command::parse("EHLO a b").is_err());
        }

        #[test]
        fn parse_mail_from_with_params() {
            let cmd = Command::parse("MAIL FROM:<sender@example.com> SIZE=1000 body=8bitmime").unwrap();
            assert_eq!(
                cmd,
                Command::MailFrom {
                    from: Address::new("sender@example.com").unwrap(),
                    body: Some("8BITMIME".to_string()),
                    size: Some(1000),
                }
            );
        }

        #[test]
        fn parse_mail_from_lowercase_without_brackets() {
            let cmd = Command::parse("mail from: sender@example.com").unwrap();
            assert!(matches!(cmd, Command::MailFrom { size: None, .. }));
        }

        #[test]
        fn parse_mail_from_invalid_size() {
            let err = Command::parse("MAIL FROM:<a@example.com> SIZE=big").unwrap_err();
            assert_eq!(err, ParseError::InvalidSize("big".to_string()));
            assert_eq!(err.to_reply().code, ReplyCode::PARAMETER_ERROR);
        }

        #[test]
        fn parse_mail_from_overflowing_size_saturates() {
            let cmd = Command::parse("MAIL FROM:<a@example.com> SIZE=99999999999999999999999").unwrap();
            assert!(matches!(cmd, Command::MailFrom { size: Some(usize::MAX), .. }));
        }

        #[test]
        fn parse_mail_from_invalid_address() {
            let err = Command::parse("MAIL FROM:<not-an-address>").unwrap_err();
            assert!(matches!(err, ParseError::InvalidAddress(_)));
            assert_eq!(err.to_reply().code, ReplyCode::MAILBOX_NAME_INVALID);
        }

        #[test]
        fn parse_mail_without_from() {
            let err = Command::parse("MAIL <a@example.com>").unwrap_err();
            assert_eq!(err.to_reply().code, ReplyCode::PARAMETER_ERROR);
        }

        #[test]
        fn parse_rcpt_to() {
            let cmd = Command::parse("RCPT TO:<recipient@example.com>").unwrap();
            assert_eq!(
                cmd,
                Command::RcptTo {
                    to: Address::new("recipient@example.com").unwrap()
                }
            );
        }

        #[test]
        fn parse_vrfy() {
            assert_eq!(
                Command::parse("VRFY user@example.com").unwrap(),
                Command::Vrfy {
                    address: "user@example.com".to_string()
                }
            );
            assert!(Command::parse("VRFY").is_err());
        }

        #[test]
        fn parse_simple_commands() {
            assert_eq!(Command::parse("data").unwrap(), Command::Data);
            assert_eq!(Command::parse("RSET").unwrap(), Command::Rset);
            assert_eq!(Command::parse("NOOP ignored").unwrap(), Command::Noop);
            assert_eq!(Command::parse("QUIT").unwrap(), Command::Quit);
            assert_eq!(Command::parse("StartTLS").unwrap(), Command::StartTls);
            assert_eq!(Command::parse("HELP").unwrap(), Command::Help);
        }

        #[test]
        fn parse_unrecognized() {
            let err = Command::parse("XYZZY").unwrap_err();
            assert_eq!(err, ParseError::Unrecognized("XYZZY".to_string()));
            assert_eq!(err.to_reply().code, ReplyCode::SYNTAX_ERROR);
        }

        #[test]
        fn serialized_commands_parse_back() {
            let commands = [
                Command::Ehlo {
                    hostname: "client.example.com".to_string(),
                },
                Command::MailFrom {
                    from: Address::new("sender@example.com").unwrap(),
                    body: None,
                    size: Some(42),
                },
                Command::RcptTo {
                    to: Address::new("recipient@example.com").unwrap(),
                },
                Command::Data,
            ];
            for command in commands {
                let wire = String::from_utf8(command.serialize()).unwrap();
                assert_eq!(Command::parse(&wire).unwrap(), command);
            }
        }
    }
}
