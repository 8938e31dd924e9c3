//! Mail envelope and message.

use crate::error::Result;
use crate::types::Address;
use courier_mime::{Content, Headers};

/// A mail: envelope sender and recipients, message headers and content.
///
/// The server builds one per transaction; the client composes one with
/// [`Mail::compose`] and sends it with
/// [`Client::send_mail`](crate::Client::send_mail).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    sender: Address,
    recipients: Vec<Address>,
    headers: Headers,
    content: Option<Content>,
}

impl Mail {
    /// Creates an empty mail for a sender.
    #[must_use]
    pub fn new(sender: Address) -> Self {
        Self {
            sender,
            recipients: Vec::new(),
            headers: Headers::new(),
            content: None,
        }
    }

    /// Creates a mail with `From`, `Date` and `MIME-Version` headers filled in.
    #[must_use]
    pub fn compose(sender: Address) -> Self {
        let mut headers = Headers::new();
        // Static header names are valid.
        let _ = headers.set("from", sender.to_string());
        let _ = headers.set("date", rfc2822_now());
        let _ = headers.set("mime-version", "1.0");

        Self {
            headers,
            ..Self::new(sender)
        }
    }

    /// Adds a visible recipient.
    ///
    /// The first recipient goes to the `To` header, later ones to `Cc`.
    #[must_use]
    pub fn to(mut self, recipient: Address) -> Self {
        let header = if self.headers.contains("to") { "cc" } else { "to" };
        let _ = self.headers.add(header, recipient.to_string());
        self.recipients.push(recipient);
        self
    }

    /// Adds a visible recipient. Same as [`Mail::to`].
    #[must_use]
    pub fn cc(self, recipient: Address) -> Self {
        self.to(recipient)
    }

    /// Adds a recipient that does not appear in any header.
    #[must_use]
    pub fn bcc(mut self, recipient: Address) -> Self {
        self.recipients.push(recipient);
        self
    }

    /// Adds to the `Subject` header. A second call appends to the first
    /// value like any repeated header.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        let _ = self.headers.add("subject", subject);
        self
    }

    /// Adds a header, appending to an existing value of the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name is invalid.
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        self.headers.add(name, value)?;
        Ok(())
    }

    /// Removes a header, returning its value.
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(name)
    }

    /// Attaches the message content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<Content>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Appends an envelope recipient.
    pub fn push_recipient(&mut self, recipient: Address) {
        self.recipients.push(recipient);
    }

    /// Replaces headers and content with what was received in DATA.
    pub fn set_message(&mut self, headers: Headers, content: Content) {
        self.headers = headers;
        self.content = Some(content);
    }

    /// Returns the envelope sender.
    #[must_use]
    pub const fn sender(&self) -> &Address {
        &self.sender
    }

    /// Returns the envelope recipients in the order they were added.
    #[must_use]
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    /// Returns the message headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the message content, if any.
    #[must_use]
    pub const fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }
}

/// Current local time in RFC 2822 form, as used in the `Date` header.
pub(crate) fn rfc2822_now() -> String {
    chrono::Local::now().to_rfc2822()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use courier_mime::Text;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    #[test]
    fn test_new_is_empty() {
        let mail = Mail::new(addr("sender@example.com"));
        assert_eq!(mail.sender().mailbox(), "sender@example.com");
        assert!(mail.recipients().is_empty());
        assert!(mail.headers().is_empty());
        assert!(mail.content().is_none());
    }

    #[test]
    fn test_compose_prefills_headers() {
        let mail = Mail::compose(addr("Sender <sender@example.com>"));
        assert_eq!(mail.headers().get("from"), Some("Sender <sender@example.com>"));
        assert_eq!(mail.headers().get("mime-version"), Some("1.0"));
        let date = mail.headers().get("date").unwrap();
        assert!(chrono::DateTime::parse_from_rfc2822(date).is_ok());
    }

    #[test]
    fn test_to_then_cc() {
        let mail = Mail::compose(addr("sender@example.com"))
            .to(addr("a@example.com"))
            .to(addr("B <b@example.com>"))
            .cc(addr("c@example.com"))
            .bcc(addr("hidden@example.com"));

        assert_eq!(mail.headers().get("to"), Some("a@example.com"));
        assert_eq!(
            mail.headers().get("cc"),
            Some("B <b@example.com>, c@example.com")
        );
        let mailboxes: Vec<&str> = mail.recipients().iter().map(Address::mailbox).collect();
        assert_eq!(
            mailboxes,
            vec![
                "a@example.com",
                "b@example.com",
                "c@example.com",
                "hidden@example.com"
            ]
        );
        assert!(!mail.headers().to_string().contains("hidden"));
    }

    #[test]
    fn test_subject_and_headers() {
        let mut mail = Mail::compose(addr("sender@example.com")).subject("Hi");
        mail.add_header("X-Mailer", "courier").unwrap();
        assert!(mail.add_header("Bad Name", "x").is_err());
        assert_eq!(mail.headers().get("subject"), Some("Hi"));
        assert_eq!(mail.remove_header("x-mailer"), Some("courier".to_string()));
    }

    #[test]
    fn test_subject_accumulates() {
        let mail = Mail::compose(addr("sender@example.com"))
            .subject("Hi")
            .subject("again");
        assert_eq!(mail.headers().get("subject"), Some("Hi, again"));
    }

    #[test]
    fn test_with_content() {
        let mail = Mail::new(addr("sender@example.com")).with_content(Text::plain("Hello"));
        assert_eq!(mail.content().unwrap().media_type(), "text/plain");
    }
}
