//! SMTP extension types.

use std::fmt;

/// SMTP extensions advertised in an EHLO response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS - TLS upgrade
    StartTls,
    /// SIZE - Maximum message size
    Size(Option<usize>),
    /// 8BITMIME - 8-bit MIME transport
    EightBitMime,
    /// PIPELINING - Command pipelining
    Pipelining,
    /// SMTPUTF8 - UTF-8 email addresses
    SmtpUtf8,
    /// VRFY - Address verification
    Vrfy,
    /// CHUNKING - Chunked message transfer
    Chunking,
    /// DSN - Delivery status notifications
    Dsn,
    /// Unknown extension, upper-cased
    Unknown(String),
}

impl Extension {
    /// Parses an extension line from EHLO response.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            return Self::Unknown(line.to_uppercase());
        }

        let keyword = parts[0].to_uppercase();
        match keyword.as_str() {
            "STARTTLS" => Self::StartTls,
            "SIZE" => {
                let size = parts.get(1).and_then(|s| s.parse().ok());
                Self::Size(size)
            }
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "SMTPUTF8" => Self::SmtpUtf8,
            "VRFY" => Self::Vrfy,
            "CHUNKING" => Self::Chunking,
            "DSN" => Self::Dsn,
            _ => Self::Unknown(line.trim().to_uppercase()),
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartTls => f.write_str("STARTTLS"),
            Self::Size(Some(size)) => write!(f, "SIZE {size}"),
            Self::Size(None) => f.write_str("SIZE"),
            Self::EightBitMime => f.write_str("8BITMIME"),
            Self::Pipelining => f.write_str("PIPELINING"),
            Self::SmtpUtf8 => f.write_str("SMTPUTF8"),
            Self::Vrfy => f.write_str("VRFY"),
            Self::Chunking => f.write_str("CHUNKING"),
            Self::Dsn => f.write_str("DSN"),
            Self::Unknown(line) => f.write_str(line),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    mod extension_parse_tests {
        use super::*;

        #[test]
        fn parse_starttls() {
            assert_eq!(Extension::parse("STARTTLS"), Extension::StartTls);
        }

        #[test]
        fn parse_starttls_lowercase() {
            assert_eq!(Extension::parse("starttls"), Extension::StartTls);
        }

        #[test]
        fn parse_size_with_value() {
            let ext = Extension::parse("SIZE 52428800");
            if let Extension::Size(size) = ext {
                assert_eq!(size, Some(52_428_800));
            } else {
                panic!("Expected Size variant");
            }
        }

        #[test]
        fn parse_size_without_value() {
            let ext = Extension::parse("SIZE");
            if let Extension::Size(size) = ext {
                assert_eq!(size, None);
            } else {
                panic!("Expected Size variant");
            }
        }

        #[test]
        fn parse_8bitmime() {
            assert_eq!(Extension::parse("8BITMIME"), Extension::EightBitMime);
        }

        #[test]
        fn parse_pipelining() {
            assert_eq!(Extension::parse("PIPELINING"), Extension::Pipelining);
        }

        #[test]
        fn parse_smtputf8() {
            assert_eq!(Extension::parse("SMTPUTF8"), Extension::SmtpUtf8);
        }

        #[test]
        fn parse_vrfy() {
            assert_eq!(Extension::parse("vrfy"), Extension::Vrfy);
        }

        #[test]
        fn parse_unknown_uppercased() {
            let ext = Extension::parse("x-custom-ext arg");
            if let Extension::Unknown(s) = ext {
                assert_eq!(s, "X-CUSTOM-EXT ARG");
            } else {
                panic!("Expected Unknown variant");
            }
        }

        #[test]
        fn parse_empty() {
            let ext = Extension::parse("");
            assert!(matches!(ext, Extension::Unknown(_)));
        }
    }

    mod display_tests {
        use super::*;

        #[test]
        fn display_roundtrip() {
            for ext in [
                Extension::StartTls,
                Extension::Size(Some(1024)),
                Extension::EightBitMime,
                Extension::Pipelining,
                Extension::SmtpUtf8,
                Extension::Vrfy,
            ] {
                assert_eq!(Extension::parse(&ext.to_string()), ext);
            }
        }

        #[test]
        fn display_size() {
            assert_eq!(Extension::Size(Some(1024)).to_string(), "SIZE 1024");
            assert_eq!(Extension::Size(None).to_string(), "SIZE");
        }
    }
}
