//! Mail header handling.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Collection of mail headers.
///
/// Names are case-insensitive and stored lowercase. Each name holds a single
/// value: adding a header that already exists appends `", " + value` to the
/// stored value, which is how repeated `To`/`Cc` headers accumulate.
/// Iteration and [`Display`](fmt::Display) output are sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Headers {
    headers: BTreeMap<String, String>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value, appending to an existing value of the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains `:` or whitespace.
    pub fn add(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let name = Self::normalize_name(name)?;
        let value = value.into();
        self.headers
            .entry(name)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.clone());
        Ok(())
    }

    /// Sets a header value, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains `:` or whitespace.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let name = Self::normalize_name(name)?;
        self.headers.insert(name, value.into());
        Ok(())
    }

    /// Sets a header value only if the header is not present yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains `:` or whitespace.
    pub fn set_default(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let name = Self::normalize_name(name)?;
        self.headers.entry(name).or_insert_with(|| value.into());
        Ok(())
    }

    /// Gets the value of a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns true if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_ascii_lowercase())
    }

    /// Removes a header, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.headers.remove(&name.to_ascii_lowercase())
    }

    /// Returns the number of distinct headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Returns an iterator over all headers, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Parses a header block.
    ///
    /// Parsing stops at the first empty line. See [`HeaderReader`] for the
    /// line rules.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut reader = HeaderReader::new();
        for line in text.lines() {
            if line.is_empty() {
                break;
            }
            reader.feed(line);
        }
        reader.finish()
    }

    fn normalize_name(name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() || name.contains(|c: char| c == ':' || c.is_whitespace()) {
            return Err(Error::InvalidHeader(name.to_string()));
        }
        Ok(name.to_ascii_lowercase())
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            write!(f, "{}: {value}\r\n", display_name(name))?;
        }
        Ok(())
    }
}

/// Capitalizes a header name (e.g., "content-type" -> "Content-Type").
fn display_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Incremental header parser fed one line at a time.
///
/// - `Name: value` starts a new header (added with [`Headers::add`]
///   semantics).
/// - A line starting with a space or tab, or a line without a colon,
///   continues the value of the previous header.
/// - A continuation line with no previous header is rejected so the caller
///   can treat it as body text.
#[derive(Debug, Default)]
pub struct HeaderReader {
    headers: Headers,
    current: Option<(String, String)>,
}

impl HeaderReader {
    /// Creates an empty reader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one header line (without its line terminator).
    ///
    /// Returns `false` if the line is neither a header nor a continuation of
    /// one; the line is not consumed in that case.
    pub fn feed(&mut self, line: &str) -> bool {
        let folded = line.starts_with(' ') || line.starts_with('\t');

        if !folded {
            if let Some((name, value)) = line.split_once(':') {
                if Headers::normalize_name(name).is_ok() {
                    self.flush();
                    self.current = Some((name.trim().to_string(), value.trim().to_string()));
                    return true;
                }
            }
        }

        match self.current.as_mut() {
            Some((_, value)) => {
                let continuation = line.trim();
                if !continuation.is_empty() {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(continuation);
                }
                true
            }
            None => false,
        }
    }

    /// Returns true if no header line has been accepted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.headers.is_empty()
    }

    /// Completes parsing and returns the collected headers.
    #[must_use]
    pub fn finish(mut self) -> Headers {
        self.flush();
        self.headers
    }

    fn flush(&mut self) {
        if let Some((name, value)) = self.current.take() {
            // The name was validated when the line was accepted.
            let _ = self.headers.add(&name, value);
        }
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

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
        assert_eq!(headers.len(), 0);
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain").unwrap();
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain")); // Case insensitive
        assert!(headers.contains("CONTENT-TYPE"));
    }

    #[test]
    fn test_headers_add_appends() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com").unwrap();
        headers.add("to", "Bob <bob@example.com>").unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(
            headers.get("To"),
            Some("alice@example.com, Bob <bob@example.com>")
        );
    }

    #[test]
    fn test_headers_set() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com").unwrap();
        headers.set("To", "charlie@example.com").unwrap();
        assert_eq!(headers.get("To"), Some("charlie@example.com"));

        headers.set_default("To", "dave@example.com").unwrap();
        headers.set_default("Subject", "Hi").unwrap();
        assert_eq!(headers.get("To"), Some("charlie@example.com"));
        assert_eq!(headers.get("Subject"), Some("Hi"));
    }

    #[test]
    fn test_headers_invalid_name() {
        let mut headers = Headers::new();
        assert!(headers.add("X-Bad:Name", "value").is_err());
        assert!(headers.add("", "value").is_err());
        assert!(headers.set("Two Words", "value").is_err());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test").unwrap();
        assert_eq!(headers.remove("SUBJECT"), Some("Test".to_string()));
        assert!(headers.get("Subject").is_none());
        assert_eq!(headers.remove("Subject"), None);
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "Body: not a header\r\n",
        );

        let headers = Headers::parse(text);
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("To"), Some("recipient@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert!(headers.get("Body").is_none());
    }

    #[test]
    fn test_reader_continuation_without_colon() {
        let mut reader = HeaderReader::new();
        assert!(reader.feed("Subject: first"));
        assert!(reader.feed("second"));
        let headers = reader.finish();
        assert_eq!(headers.get("subject"), Some("first second"));
    }

    #[test]
    fn test_reader_rejects_orphan_line() {
        let mut reader = HeaderReader::new();
        assert!(!reader.feed("just some text"));
        assert!(reader.is_empty());
    }

    #[test]
    fn test_reader_repeated_header_appends() {
        let mut reader = HeaderReader::new();
        reader.feed("Cc: a@example.com");
        reader.feed("Cc: b@example.com");
        let headers = reader.finish();
        assert_eq!(headers.get("cc"), Some("a@example.com, b@example.com"));
    }

    #[test]
    fn test_headers_display_sorted() {
        let mut headers = Headers::new();
        headers.add("to", "recipient@example.com").unwrap();
        headers.add("from", "sender@example.com").unwrap();
        headers.add("mime-version", "1.0").unwrap();

        assert_eq!(
            headers.to_string(),
            "From: sender@example.com\r\nMime-Version: 1.0\r\nTo: recipient@example.com\r\n"
        );
    }

    #[test]
    fn test_headers_iter() {
        let mut headers = Headers::new();
        headers.add("From", "sender@example.com").unwrap();
        headers.add("To", "recipient@example.com").unwrap();

        let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["from", "to"]);
    }
}
