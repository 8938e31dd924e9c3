//! # courier-smtp
//!
//! SMTP (RFC 5321) server session engine and client driver.
//!
//! ## Features
//!
//! - **Server**: per-connection state machine with a [`Policy`](server::Policy)
//!   deciding what is accepted and where finished mail goes
//! - **Client**: EHLO/HELO negotiation, pipelining, dot-stuffed DATA
//! - **TLS**: STARTTLS on both sides and implicit TLS (port 465) on the client
//! - **Delivery**: MX resolution and direct delivery to recipient domains
//! - **Content**: MIME bodies from [`courier_mime`]
//!
//! ## Quick Start
//!
//! ### Sending mail
//!
//! ```no_run
//! use courier_smtp::{Address, Client, Config, Mail};
//! use courier_mime::Text;
//!
//! #[tokio::main]
//! async fn main() -> courier_smtp::Result<()> {
//!     let mut client = Client::connect("smtp.example.com", 587, Config::default()).await?;
//!
//!     // EHLO, STARTTLS when offered, EHLO again
//!     client.hello().await?;
//!
//!     let mail = Mail::compose(Address::new("sender@example.com")?)
//!         .to(Address::new("recipient@example.com")?)
//!         .subject("Test")
//!         .with_content(Text::plain("Hello, World!"));
//!
//!     client.send_mail(&mail).await?;
//!     client.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ### Delivering through MX lookup
//!
//! ```no_run
//! use courier_smtp::delivery;
//! use courier_smtp::mx::DnsResolver;
//! use courier_smtp::{Address, Config};
//! use courier_mime::Text;
//!
//! # async fn run() -> courier_smtp::Result<()> {
//! let reply = delivery::send_mail(
//!     Address::new("sender@example.com")?,
//!     Address::new("recipient@example.org")?,
//!     "Hello",
//!     Text::plain("Delivered directly."),
//!     &DnsResolver::new(),
//!     &Config::default(),
//! )
//! .await?;
//! println!("{}", reply.message_text());
//! # Ok(())
//! # }
//! ```
//!
//! ## Session Phases
//!
//! ```text
//! ┌──────────────┐  HELO/EHLO  ┌────────────┐  MAIL  ┌──────────┐  RCPT  ┌────────────────┐
//! │ Unidentified │ ──────────→ │ Identified │ ─────→ │ MailOpen │ ─────→ │ RecipientsOpen │
//! └──────────────┘             └────────────┘        └──────────┘        └────────────────┘
//!        ↑                           ↑                                           │
//!        └── RSET / STARTTLS         └────────────── DATA complete ──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP commands, serialized by the client and parsed by the server
//! - [`connection`]: Client connection and driver
//! - [`delivery`]: MX-based delivery
//! - [`mx`]: Mail exchanger resolution
//! - [`parser`]: Reply parser
//! - [`server`]: Listener, sessions and policy
//! - [`types`]: Core SMTP types (addresses, extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
pub mod delivery;
mod error;
mod framing;
mod mail;
pub mod mx;
pub mod parser;
pub mod server;
pub mod types;

pub use command::Command;
pub use connection::{Client, Config, Security, ServerInfo, SmtpStream};
pub use error::{Error, Result};
pub use mail::Mail;
pub use types::{Address, Extension, Reply, ReplyCode};
