//! MIME content tree.
//!
//! A mail body is a tree of [`Content`] nodes: text and attachment leaves
//! under [`Multipart`] branches. [`Content::encode`] renders a node as its
//! own header lines, a blank line and the transfer-encoded body;
//! [`Content::decode`] rebuilds the tree from a header block and a body.

use crate::content_type::ContentType;
use crate::encoding::{TransferEncoding, encode_base64_wrapped};
use crate::error::{Error, Result};
use crate::header::{HeaderReader, Headers};
use uuid::Uuid;

/// A node of the MIME content tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Content {
    /// Text leaf, sent as quoted-printable UTF-8.
    Text(Text),
    /// Binary leaf, sent as base64.
    Attachment(Attachment),
    /// Branch holding an ordered list of parts.
    Multipart(Multipart),
}

/// Text content with CRLF line breaks.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Text {
    media_type: String,
    body: String,
}

/// Binary content delivered as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attachment {
    media_type: String,
    filename: Option<String>,
    bytes: Vec<u8>,
}

/// Multipart container.
///
/// The boundary never equals the boundary of any multipart nested below it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Multipart {
    sub_type: String,
    boundary: String,
    parts: Vec<Content>,
}

impl Text {
    /// Creates text content of the given media type.
    ///
    /// Line breaks in `body` are normalized to CRLF.
    #[must_use]
    pub fn new(media_type: impl Into<String>, body: &str) -> Self {
        Self {
            media_type: media_type.into().to_ascii_lowercase(),
            body: normalize_line_breaks(body),
        }
    }

    /// Creates `text/plain` content.
    #[must_use]
    pub fn plain(body: &str) -> Self {
        Self::new("text/plain", body)
    }

    /// Creates `text/html` content.
    #[must_use]
    pub fn html(body: &str) -> Self {
        Self::new("text/html", body)
    }

    /// Returns the media type (e.g., "text/plain").
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Returns the body text.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }
}

impl Attachment {
    /// Creates an attachment. Spaces in the filename become `_`.
    #[must_use]
    pub fn new(media_type: impl Into<String>, filename: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into().to_ascii_lowercase(),
            filename: filename.map(|name| name.replace(' ', "_")),
            bytes,
        }
    }

    /// Returns the media type.
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Returns the filename, if any.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Returns the raw attachment data.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

impl Multipart {
    /// Creates an empty `multipart/alternative` container with a random
    /// boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::with_sub_type("alternative")
    }

    /// Creates an empty container of the given multipart subtype.
    #[must_use]
    pub fn with_sub_type(sub_type: impl Into<String>) -> Self {
        Self {
            sub_type: sub_type.into().to_ascii_lowercase(),
            boundary: generate_boundary(),
            parts: Vec::new(),
        }
    }

    /// Replaces the boundary.
    ///
    /// A boundary already used by one of the parts is replaced by a fresh
    /// one, as is any collision introduced by parts pushed afterwards.
    #[must_use]
    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self.regenerate_on_collision();
        self
    }

    /// Appends a part.
    ///
    /// If the boundary of this container appears anywhere below it after the
    /// insertion, a new boundary is generated until it is unique.
    pub fn push(&mut self, part: impl Into<Content>) {
        self.parts.push(part.into());
        self.regenerate_on_collision();
    }

    fn regenerate_on_collision(&mut self) {
        while self.parts.iter().any(|p| p.uses_boundary(&self.boundary)) {
            self.boundary = generate_boundary();
        }
    }

    /// Appends a part, builder style.
    #[must_use]
    pub fn with_part(mut self, part: impl Into<Content>) -> Self {
        self.push(part);
        self
    }

    /// Returns the multipart subtype (e.g., "alternative").
    #[must_use]
    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    /// Returns the boundary token.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Returns the parts in insertion order.
    #[must_use]
    pub fn parts(&self) -> &[Content] {
        &self.parts
    }
}

impl From<Text> for Content {
    fn from(text: Text) -> Self {
        Self::Text(text)
    }
}

impl From<Attachment> for Content {
    fn from(attachment: Attachment) -> Self {
        Self::Attachment(attachment)
    }
}

impl From<Multipart> for Content {
    fn from(multipart: Multipart) -> Self {
        Self::Multipart(multipart)
    }
}

impl Content {
    /// Returns the media type of the node.
    #[must_use]
    pub fn media_type(&self) -> String {
        match self {
            Self::Text(text) => text.media_type.clone(),
            Self::Attachment(attachment) => attachment.media_type.clone(),
            Self::Multipart(multipart) => format!("multipart/{}", multipart.sub_type),
        }
    }

    /// Encodes the node as header lines, a blank line and the body.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Text(text) => format!(
                "Content-Type: {}; charset=\"UTF-8\"\r\n\
                 Content-Transfer-Encoding: quoted-printable\r\n\r\n{}",
                text.media_type,
                TransferEncoding::QuotedPrintable.encode_text(&text.body),
            ),
            Self::Attachment(attachment) => {
                let mut out = format!("Content-Type: {}\r\n", attachment.media_type);
                match &attachment.filename {
                    Some(name) => {
                        out.push_str("Content-Disposition: attachment; filename=\"");
                        out.push_str(name);
                        out.push_str("\"\r\n");
                    }
                    None => out.push_str("Content-Disposition: attachment\r\n"),
                }
                out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
                out.push_str(&encode_base64_wrapped(&attachment.bytes));
                out
            }
            Self::Multipart(multipart) => {
                let boundary = &multipart.boundary;
                let mut out = format!(
                    "Content-Type: multipart/{}; boundary=\"{boundary}\"\r\n\
                     Content-Transfer-Encoding: 7bit\r\n\r\n",
                    multipart.sub_type,
                );
                for part in &multipart.parts {
                    out.push_str("--");
                    out.push_str(boundary);
                    out.push_str("\r\n");
                    out.push_str(&part.encode());
                    out.push_str("\r\n");
                }
                out.push_str("--");
                out.push_str(boundary);
                out.push_str("--");
                out
            }
        }
    }

    /// Decodes a node from its headers and transfer-encoded body.
    ///
    /// A missing `Content-Type` means `text/plain`.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type or transfer encoding is invalid,
    /// a multipart has no boundary or no delimiter, or base64 data is
    /// malformed.
    pub fn decode(headers: &Headers, body: &str) -> Result<Self> {
        let content_type = headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)?;

        if content_type.is_multipart() {
            let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
            return decode_multipart(&content_type.sub_type, boundary, body);
        }

        let encoding = match headers.get("content-transfer-encoding") {
            Some(name) => name.parse::<TransferEncoding>()?,
            None => TransferEncoding::default(),
        };

        if let Some(disposition) = headers.get("content-disposition") {
            if disposition
                .trim_start()
                .to_ascii_lowercase()
                .starts_with("attachment")
            {
                let bytes = encoding.decode_bytes(body)?;
                let filename = disposition_filename(disposition);
                return Ok(Self::Attachment(Attachment::new(
                    content_type.media_type(),
                    filename.as_deref(),
                    bytes,
                )));
            }
        }

        let text = encoding.decode_text(body)?;
        Ok(Self::Text(Text::new(content_type.media_type(), &text)))
    }

    /// Parses a complete entity: header block, blank line, body.
    ///
    /// # Errors
    ///
    /// See [`Content::decode`].
    pub fn parse(raw: &str) -> Result<Self> {
        let (head, body) = raw
            .split_once("\r\n\r\n")
            .or_else(|| raw.split_once("\n\n"))
            .unwrap_or((raw, ""));
        Self::decode(&Headers::parse(head), body)
    }

    fn uses_boundary(&self, boundary: &str) -> bool {
        match self {
            Self::Multipart(multipart) => {
                multipart.boundary == boundary
                    || multipart.parts.iter().any(|p| p.uses_boundary(boundary))
            }
            Self::Text(_) | Self::Attachment(_) => false,
        }
    }
}

fn generate_boundary() -> String {
    format!("courier-{}", Uuid::new_v4().simple())
}

fn normalize_line_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\r\n");
            }
            '\n' => out.push_str("\r\n"),
            other => out.push(other),
        }
    }
    out
}

fn disposition_filename(disposition: &str) -> Option<String> {
    disposition.split(';').skip(1).find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("filename")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

enum Segment {
    Headers(HeaderReader),
    Body(Headers, Vec<String>),
}

impl Segment {
    fn finish(self) -> Result<Content> {
        match self {
            Self::Headers(reader) => Content::decode(&reader.finish(), ""),
            Self::Body(headers, lines) => Content::decode(&headers, &lines.join("\r\n")),
        }
    }
}

fn decode_multipart(sub_type: &str, boundary: &str, body: &str) -> Result<Content> {
    let delimiter = format!("--{boundary}");
    let close_delimiter = format!("--{boundary}--");

    let mut multipart = Multipart::with_sub_type(sub_type).with_boundary(boundary);
    let mut segment: Option<Segment> = None;
    let mut found = false;

    for line in body.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let marker = line.trim_end();

        if marker == delimiter || marker == close_delimiter {
            found = true;
            if let Some(current) = segment.take() {
                multipart.parts.push(current.finish()?);
            }
            if marker == close_delimiter {
                break;
            }
            segment = Some(Segment::Headers(HeaderReader::new()));
            continue;
        }

        segment = match segment.take() {
            // Preamble before the first delimiter.
            None => None,
            Some(Segment::Headers(mut reader)) => {
                if line.is_empty() {
                    Some(Segment::Body(reader.finish(), Vec::new()))
                } else if reader.feed(line) {
                    Some(Segment::Headers(reader))
                } else {
                    Some(Segment::Body(reader.finish(), vec![line.to_string()]))
                }
            }
            Some(Segment::Body(headers, mut lines)) => {
                lines.push(line.to_string());
                Some(Segment::Body(headers, lines))
            }
        };
    }

    if !found {
        return Err(Error::InvalidMultipart(format!(
            "no delimiter for boundary {boundary}"
        )));
    }
    if let Some(current) = segment {
        multipart.parts.push(current.finish()?);
    }

    Ok(Content::Multipart(multipart))
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

    fn roundtrip(content: &Content) -> Content {
        Content::parse(&content.encode()).unwrap()
    }

    #[test]
    fn test_text_normalizes_line_breaks() {
        let text = Text::plain("one\ntwo\rthree\r\nfour");
        assert_eq!(text.body(), "one\r\ntwo\r\nthree\r\nfour");
        assert_eq!(text.media_type(), "text/plain");
    }

    #[test]
    fn test_text_encode() {
        let content = Content::from(Text::plain("Héllo"));
        assert_eq!(
            content.encode(),
            "Content-Type: text/plain; charset=\"UTF-8\"\r\n\
             Content-Transfer-Encoding: quoted-printable\r\n\r\nH=C3=A9llo"
        );
    }

    #[test]
    fn test_text_roundtrip() {
        let content = Content::from(Text::plain("Hêlló, wörld!\r\n\r\n.\r\n"));
        assert_eq!(roundtrip(&content), content);
    }

    #[test]
    fn test_attachment_filename_spaces() {
        let attachment = Attachment::new("application/pdf", Some("my report.pdf"), vec![1, 2, 3]);
        assert_eq!(attachment.filename(), Some("my_report.pdf"));
    }

    #[test]
    fn test_attachment_roundtrip() {
        let bytes: Vec<u8> = (0..=255).collect();
        let content = Content::from(Attachment::new(
            "application/octet-stream",
            Some("data.bin"),
            bytes.clone(),
        ));

        let encoded = content.encode();
        assert!(encoded.contains("Content-Disposition: attachment; filename=\"data.bin\""));
        assert!(encoded.lines().all(|line| line.len() <= 76));

        match roundtrip(&content) {
            Content::Attachment(decoded) => {
                assert_eq!(decoded.bytes(), bytes.as_slice());
                assert_eq!(decoded.filename(), Some("data.bin"));
                assert_eq!(decoded.media_type(), "application/octet-stream");
            }
            other => panic!("expected attachment, got {other:?}"),
        }
    }

    #[test]
    fn test_multipart_roundtrip() {
        let multipart = Multipart::new()
            .with_part(Text::plain("Hêlló, wörld!\r\n\r\n.\r\n"))
            .with_part(Text::html("<p>Hêlló, wörld!</p>"));
        let content = Content::from(multipart);

        let decoded = roundtrip(&content);
        assert_eq!(decoded, content);

        let Content::Multipart(decoded) = decoded else {
            panic!("expected multipart");
        };
        assert_eq!(decoded.sub_type(), "alternative");
        assert_eq!(decoded.parts().len(), 2);
        assert_eq!(decoded.parts()[0].media_type(), "text/plain");
        assert_eq!(decoded.parts()[1].media_type(), "text/html");
    }

    #[test]
    fn test_nested_multipart_roundtrip() {
        let inner = Multipart::new()
            .with_part(Text::plain("plain"))
            .with_part(Text::html("<b>html</b>"));
        let outer = Multipart::with_sub_type("mixed")
            .with_part(inner)
            .with_part(Attachment::new("image/png", Some("dot.png"), vec![0x89, 0x50]));
        let content = Content::from(outer);

        assert_eq!(roundtrip(&content), content);
    }

    #[test]
    fn test_boundary_collision_regenerates() {
        let inner = Multipart::new()
            .with_boundary("shared")
            .with_part(Text::plain("inner"));
        let mut outer = Multipart::with_sub_type("mixed").with_boundary("shared");
        outer.push(inner);

        assert_ne!(outer.boundary(), "shared");
        let Content::Multipart(inner) = &outer.parts()[0] else {
            panic!("expected multipart");
        };
        assert_eq!(inner.boundary(), "shared");
    }

    #[test]
    fn test_boundary_set_after_parts_regenerates() {
        let inner = Multipart::new().with_part(Text::plain("inner"));
        let inner_boundary = inner.boundary().to_string();
        let outer = Multipart::with_sub_type("mixed")
            .with_part(inner)
            .with_boundary(inner_boundary.clone());

        assert_ne!(outer.boundary(), inner_boundary);
        let content = Content::from(outer);
        assert_eq!(roundtrip(&content), content);
    }

    #[test]
    fn test_boundary_collision_deep() {
        let deepest = Multipart::new().with_boundary("deep").with_part(Text::plain("x"));
        let middle = Multipart::new().with_boundary("middle").with_part(deepest);
        let outer = Multipart::new().with_boundary("deep").with_part(middle);

        assert_ne!(outer.boundary(), "deep");
        assert_ne!(outer.boundary(), "middle");
    }

    #[test]
    fn test_decode_defaults_to_text_plain() {
        let content = Content::decode(&Headers::new(), "Hello\r\nWorld").unwrap();
        assert_eq!(content, Content::from(Text::plain("Hello\r\nWorld")));
    }

    #[test]
    fn test_decode_multipart_with_preamble() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n",
            "\r\n",
            "This is a multi-part message in MIME format.\r\n",
            "--XYZ\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "first\r\n",
            "--XYZ\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "c2Vjb25k\r\n",
            "--XYZ--\r\n",
            "epilogue\r\n",
        );

        let Content::Multipart(multipart) = Content::parse(raw).unwrap() else {
            panic!("expected multipart");
        };
        assert_eq!(multipart.sub_type(), "mixed");
        assert_eq!(multipart.boundary(), "XYZ");
        assert_eq!(
            multipart.parts(),
            &[
                Content::from(Text::plain("first")),
                Content::from(Text::plain("second")),
            ]
        );
    }

    #[test]
    fn test_decode_part_without_headers() {
        let raw = "Content-Type: multipart/alternative; boundary=b\r\n\r\n--b\r\nplain body\r\n--b--";
        let Content::Multipart(multipart) = Content::parse(raw).unwrap() else {
            panic!("expected multipart");
        };
        assert_eq!(multipart.parts(), &[Content::from(Text::plain("plain body"))]);
    }

    #[test]
    fn test_decode_missing_boundary() {
        let err = Content::parse("Content-Type: multipart/mixed\r\n\r\nbody").unwrap_err();
        assert!(matches!(err, Error::MissingBoundary));
    }

    #[test]
    fn test_decode_missing_delimiter() {
        let err = Content::parse("Content-Type: multipart/mixed; boundary=b\r\n\r\nbody").unwrap_err();
        assert!(matches!(err, Error::InvalidMultipart(_)));
    }

    #[test]
    fn test_decode_unknown_encoding() {
        let err = Content::parse("Content-Transfer-Encoding: x-custom\r\n\r\nbody").unwrap_err();
        assert!(matches!(err, Error::InvalidEncoding(_)));
    }
}
