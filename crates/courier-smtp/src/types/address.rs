//! Email address types.

use crate::error::{Error, Result};
use std::fmt;

/// Characters that cannot appear in a mailbox or display name.
const FORBIDDEN: [char; 3] = ['<', '>', ','];

/// Email address with an optional display name.
///
/// The mailbox always holds exactly one `@` between a non-empty local part
/// and a non-empty domain. Neither the mailbox nor the name contains `<`, `>`
/// or `,`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    name: Option<String>,
    mailbox: String,
}

impl Address {
    /// Creates an address without a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox is invalid.
    pub fn new(mailbox: impl Into<String>) -> Result<Self> {
        let mailbox = mailbox.into();
        Self::validate_mailbox(&mailbox)?;
        Ok(Self {
            name: None,
            mailbox,
        })
    }

    /// Creates an address with a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox is invalid or the name contains
    /// `<`, `>` or `,`.
    pub fn with_name(name: impl Into<String>, mailbox: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.contains(FORBIDDEN) {
            return Err(Error::InvalidAddress(format!(
                "Display name contains forbidden characters: {name}"
            )));
        }
        let mut address = Self::new(mailbox)?;
        address.name = Some(name).filter(|n| !n.trim().is_empty());
        Ok(address)
    }

    /// Creates an address after stripping `<`, `>` and `,` from both parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the stripped mailbox is still invalid.
    pub fn sanitize(name: Option<&str>, mailbox: &str) -> Result<Self> {
        let strip = |s: &str| s.replace(FORBIDDEN, "").trim().to_string();
        let mailbox = strip(mailbox);
        match name.map(strip) {
            Some(name) => Self::with_name(name, mailbox),
            None => Self::new(mailbox),
        }
    }

    /// Parses `mailbox`, `<mailbox>` or `Name <mailbox>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the text matches none of these forms or the
    /// mailbox is invalid.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();

        let Some(open) = text.find('<') else {
            return Self::new(text);
        };
        let inner = text[open + 1..]
            .strip_suffix('>')
            .ok_or_else(|| Error::InvalidAddress(text.to_string()))?;

        let name = text[..open].trim().trim_matches('"').trim();
        if name.is_empty() {
            Self::new(inner)
        } else {
            Self::with_name(name, inner)
        }
    }

    /// Returns the display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the mailbox (`local@domain`).
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// Returns the part before the `@`.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.mailbox
            .split_once('@')
            .map_or(self.mailbox.as_str(), |(local, _)| local)
    }

    /// Returns the part after the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.mailbox
            .split_once('@')
            .map_or("", |(_, domain)| domain)
    }

    fn validate_mailbox(mailbox: &str) -> Result<()> {
        if mailbox.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if mailbox.contains(FORBIDDEN) || mailbox.contains(char::is_whitespace) {
            return Err(Error::InvalidAddress(format!(
                "Address contains forbidden characters: {mailbox}"
            )));
        }

        let Some((local, domain)) = mailbox.split_once('@') else {
            return Err(Error::InvalidAddress("Address must contain @".into()));
        };

        if domain.contains('@') {
            return Err(Error::InvalidAddress(
                "Address must have exactly one @".into(),
            ));
        }

        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(
                "Local and domain parts cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.mailbox),
            None => f.write_str(&self.mailbox),
        }
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.mailbox(), "user@example.com");
        assert_eq!(addr.local_part(), "user");
        assert_eq!(addr.domain(), "example.com");
        assert!(addr.name().is_none());
    }

    #[test]
    fn test_invalid_address_no_at() {
        assert!(Address::new("userexample.com").is_err());
    }

    #[test]
    fn test_invalid_address_two_at() {
        assert!(Address::new("user@host@example.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty() {
        assert!(Address::new("").is_err());
    }

    #[test]
    fn test_invalid_address_empty_local() {
        assert!(Address::new("@example.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty_domain() {
        assert!(Address::new("user@").is_err());
    }

    #[test]
    fn test_invalid_address_forbidden_chars() {
        assert!(Address::new("<user@example.com>").is_err());
        assert!(Address::new("a,b@example.com").is_err());
        assert!(Address::with_name("Doe, John", "john@example.com").is_err());
    }

    #[test]
    fn test_with_name() {
        let addr = Address::with_name("John Doe", "john@example.com").unwrap();
        assert_eq!(addr.name(), Some("John Doe"));
        assert_eq!(addr.to_string(), "John Doe <john@example.com>");
    }

    #[test]
    fn test_sanitize() {
        let addr = Address::sanitize(Some("Doe, <John>"), "<john@example.com>").unwrap();
        assert_eq!(addr.name(), Some("Doe John"));
        assert_eq!(addr.mailbox(), "john@example.com");

        assert!(Address::sanitize(None, "<nobody>").is_err());
    }

    #[test]
    fn test_parse_forms() {
        let bare = Address::parse("user@example.com").unwrap();
        assert_eq!(bare.mailbox(), "user@example.com");

        let bracketed = Address::parse("<user@example.com>").unwrap();
        assert_eq!(bracketed, bare);

        let named: Address = "Jane Roe <jane@example.com>".parse().unwrap();
        assert_eq!(named.name(), Some("Jane Roe"));
        assert_eq!(named.mailbox(), "jane@example.com");

        let quoted = Address::parse("\"Jane Roe\" <jane@example.com>").unwrap();
        assert_eq!(quoted, named);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Address::parse("<user@example.com").is_err());
        assert!(Address::parse("Name <>").is_err());
        assert!(Address::parse("not an address").is_err());
    }
}
