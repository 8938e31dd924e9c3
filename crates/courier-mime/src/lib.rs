//! # courier-mime
//!
//! MIME content model and transfer-encoding codecs for SMTP mail.
//!
//! ## Features
//!
//! - **Content tree**: text, attachment and multipart nodes with encode/decode
//! - **Headers**: case-insensitive header map and a line-by-line header reader
//! - **Codecs**: 7bit, 8bit, quoted-printable and base64 transfer encodings
//! - **Content types**: `type/subtype; param=value` parsing
//!
//! ## Quick Start
//!
//! ### Building content
//!
//! ```
//! use courier_mime::{Content, Multipart, Text};
//!
//! let content = Content::from(
//!     Multipart::new()
//!         .with_part(Text::plain("Hello, World!"))
//!         .with_part(Text::html("<p>Hello, World!</p>")),
//! );
//!
//! let encoded = content.encode();
//! assert!(encoded.starts_with("Content-Type: multipart/alternative"));
//! ```
//!
//! ### Decoding content
//!
//! ```
//! use courier_mime::{Content, Headers};
//!
//! let mut headers = Headers::new();
//! headers.add("Content-Transfer-Encoding", "quoted-printable")?;
//!
//! let content = Content::decode(&headers, "H=C3=A9llo")?;
//! let Content::Text(text) = content else { unreachable!() };
//! assert_eq!(text.body(), "Héllo");
//! # Ok::<(), courier_mime::Error>(())
//! ```
//!
//! ### Encoding/Decoding
//!
//! ```
//! use courier_mime::encoding::{decode_quoted_printable, encode_quoted_printable};
//!
//! let encoded = encode_quoted_printable("Héllo = Wörld".as_bytes());
//! assert_eq!(encoded, "H=C3=A9llo=20=3D=20W=C3=B6rld");
//! assert_eq!(decode_quoted_printable(&encoded), "Héllo = Wörld".as_bytes());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content;
mod content_type;
mod error;
mod header;

pub mod encoding;

pub use content::{Attachment, Content, Multipart, Text};
pub use content_type::ContentType;
pub use encoding::TransferEncoding;
pub use error::{Error, Result};
pub use header::{HeaderReader, Headers};
