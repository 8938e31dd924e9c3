//! Content-transfer-encoding codecs.
//!
//! Supports the four encodings SMTP mail bodies travel in: `7bit`, `8bit`,
//! `quoted-printable` and `base64`.
//!
//! ## Quoted-printable
//!
//! The encoder escapes every byte outside the printable range `33..=126`,
//! plus `=` itself, as `=HH` with uppercase hex digits. CR and LF are the
//! only exceptions: they pass through unescaped so the encoded text keeps
//! the line structure of the original. Lines are kept within 76 columns
//! with `=` soft line breaks.
//!
//! The decoder turns `=HH` back into a byte, drops soft line breaks and
//! passes every other character through unchanged, including malformed
//! `=` sequences.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::fmt::Write as _;

/// Maximum encoded line length for quoted-printable and base64 output.
const MAX_LINE_LENGTH: usize = 76;

/// Content transfer encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII, no transformation.
    #[default]
    SevenBit,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Base64 encoding.
    Base64,
    /// 8-bit data, no transformation.
    EightBit,
}

impl TransferEncoding {
    /// Looks up an encoding by its header name (case-insensitive).
    ///
    /// Returns `None` for names this codec does not know.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "7bit" => Some(Self::SevenBit),
            "quoted-printable" => Some(Self::QuotedPrintable),
            "base64" => Some(Self::Base64),
            "8bit" => Some(Self::EightBit),
            _ => None,
        }
    }

    /// Returns the header name of the encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SevenBit => "7bit",
            Self::QuotedPrintable => "quoted-printable",
            Self::Base64 => "base64",
            Self::EightBit => "8bit",
        }
    }

    /// Encodes raw bytes for transfer.
    #[must_use]
    pub fn encode_bytes(self, data: &[u8]) -> String {
        match self {
            Self::SevenBit | Self::EightBit => String::from_utf8_lossy(data).into_owned(),
            Self::QuotedPrintable => encode_quoted_printable(data),
            Self::Base64 => encode_base64_wrapped(data),
        }
    }

    /// Decodes transferred text back into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid base64.
    pub fn decode_bytes(self, text: &str) -> Result<Vec<u8>> {
        match self {
            Self::SevenBit | Self::EightBit => Ok(text.as_bytes().to_vec()),
            Self::QuotedPrintable => Ok(decode_quoted_printable(text)),
            Self::Base64 => decode_base64(text),
        }
    }

    /// Encodes UTF-8 text for transfer.
    #[must_use]
    pub fn encode_text(self, text: &str) -> String {
        self.encode_bytes(text.as_bytes())
    }

    /// Decodes transferred text, replacing invalid UTF-8 sequences.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid base64.
    pub fn decode_text(self, text: &str) -> Result<String> {
        let bytes = self.decode_bytes(text)?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransferEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::InvalidEncoding(s.to_string()))
    }
}

/// Encodes data as Base64 on a single line.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64, broken into CRLF-separated 76-column lines.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut result = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);
    for (i, chunk) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if i > 0 {
            result.push_str("\r\n");
        }
        // Base64 output is pure ASCII.
        result.extend(chunk.iter().map(|&b| char::from(b)));
    }
    result
}

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

const fn needs_escape(byte: u8) -> bool {
    byte < 33 || byte > 126 || byte == b'='
}

/// Encodes bytes using Quoted-Printable encoding.
///
/// See the [module documentation](self) for the exact rule.
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len());
    let mut line_length = 0;

    for &byte in data {
        if byte == b'\r' || byte == b'\n' {
            result.push(char::from(byte));
            line_length = 0;
            continue;
        }

        let width = if needs_escape(byte) { 3 } else { 1 };
        // Keep one column free for the soft break marker.
        if line_length + width > MAX_LINE_LENGTH - 1 {
            result.push_str("=\r\n");
            line_length = 0;
        }

        if width == 3 {
            let _ = write!(result, "={byte:02X}");
        } else {
            result.push(char::from(byte));
        }
        line_length += width;
    }

    result
}

/// Decodes Quoted-Printable text into bytes.
///
/// Never fails: malformed escapes are kept literally.
#[must_use]
pub fn decode_quoted_printable(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'=' {
            match (bytes.get(i + 1), bytes.get(i + 2)) {
                // Soft line break
                (Some(b'\r'), Some(b'\n')) => {
                    i += 3;
                    continue;
                }
                (Some(b'\n'), _) => {
                    i += 2;
                    continue;
                }
                (Some(&high), Some(&low)) => {
                    if let (Some(high), Some(low)) = (hex_value(high), hex_value(low)) {
                        result.push((high << 4) | low);
                        i += 3;
                        continue;
                    }
                }
                _ => {}
            }
        }
        result.push(bytes[i]);
        i += 1;
    }

    result
}

const fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
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
    use proptest::prelude::*;

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), Some(TransferEncoding::SevenBit));
        assert_eq!(TransferEncoding::parse("BASE64"), Some(TransferEncoding::Base64));
        assert_eq!(
            TransferEncoding::parse(" Quoted-Printable "),
            Some(TransferEncoding::QuotedPrintable)
        );
        assert_eq!(TransferEncoding::parse("8bit"), Some(TransferEncoding::EightBit));
        assert_eq!(TransferEncoding::parse("x-uuencode"), None);
        assert!("x-uuencode".parse::<TransferEncoding>().is_err());
    }

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_wrapped_lines() {
        let data = vec![0xABu8; 200];
        let encoded = encode_base64_wrapped(&data);
        assert!(encoded.split("\r\n").all(|line| line.len() <= MAX_LINE_LENGTH));
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_base64_invalid() {
        assert!(decode_base64("not base64!").is_err());
    }

    #[test]
    fn test_quoted_printable_encode() {
        assert_eq!(encode_quoted_printable(b"Hello,World!"), "Hello,World!");
        assert_eq!(encode_quoted_printable(b"a b\tc"), "a=20b=09c");
        assert_eq!(encode_quoted_printable(b"1+1=2"), "1+1=3D2");
        assert_eq!(
            encode_quoted_printable("Héllo".as_bytes()),
            "H=C3=A9llo"
        );
    }

    #[test]
    fn test_quoted_printable_keeps_line_breaks() {
        let encoded = encode_quoted_printable(b"one\r\ntwo\n.\r\n");
        assert_eq!(encoded, "one\r\ntwo\n.\r\n");
    }

    #[test]
    fn test_quoted_printable_soft_line_breaks() {
        let text = "é".repeat(60);
        let encoded = encode_quoted_printable(text.as_bytes());
        for line in encoded.split("\r\n") {
            assert!(line.len() <= MAX_LINE_LENGTH, "line too long: {line}");
        }
        assert_eq!(decode_quoted_printable(&encoded), text.as_bytes());
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable("Hello, World!"), b"Hello, World!");
        assert_eq!(decode_quoted_printable("H=C3=A9llo"), "Héllo".as_bytes());
        assert_eq!(decode_quoted_printable("h=c3=a9llo"), "héllo".as_bytes());
        assert_eq!(decode_quoted_printable("Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable("Hello=\nWorld"), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_malformed_passes_through() {
        assert_eq!(decode_quoted_printable("a=ZZb"), b"a=ZZb");
        assert_eq!(decode_quoted_printable("trailing="), b"trailing=");
        assert_eq!(decode_quoted_printable("x=4"), b"x=4");
    }

    #[test]
    fn test_identity_encodings() {
        let text = "Hêlló, wörld!\r\n\r\n.\r\n";
        for encoding in [TransferEncoding::SevenBit, TransferEncoding::EightBit] {
            assert_eq!(encoding.encode_text(text), text);
            assert_eq!(encoding.decode_text(text).unwrap(), text);
        }
    }

    #[test]
    fn test_decode_text_replaces_invalid_utf8() {
        let decoded = TransferEncoding::QuotedPrintable.decode_text("a=FFb").unwrap();
        assert_eq!(decoded, "a\u{FFFD}b");
    }

    proptest! {
        #[test]
        fn quoted_printable_round_trip(text in any::<String>()) {
            let encoding = TransferEncoding::QuotedPrintable;
            prop_assert_eq!(encoding.decode_text(&encoding.encode_text(&text)).unwrap(), text);
        }

        #[test]
        fn base64_round_trip(text in any::<String>()) {
            let encoding = TransferEncoding::Base64;
            prop_assert_eq!(encoding.decode_text(&encoding.encode_text(&text)).unwrap(), text);
        }

        #[test]
        fn quoted_printable_output_is_ascii(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let encoded = encode_quoted_printable(&data);
            prop_assert!(encoded.is_ascii());
            prop_assert_eq!(decode_quoted_printable(&encoded), data);
        }
    }
}
