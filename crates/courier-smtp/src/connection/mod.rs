//! SMTP client connection management.

mod client;
mod config;
mod stream;

pub use client::Client;
pub use config::{Config, ConfigBuilder, Security};
pub use stream::{SmtpStream, connect, connect_tls, server_name};

use crate::types::Extension;
use std::collections::HashSet;

/// Server identity and capabilities from the HELO/EHLO response.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname line, the first line of the hello reply.
    pub hostname: String,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Builds server info from the lines of a hello reply.
    #[must_use]
    pub fn from_hello(lines: &[String]) -> Self {
        let hostname = lines.first().map(|line| line.trim().to_string()).unwrap_or_default();
        let extensions = lines.iter().skip(1).map(|line| Extension::parse(line)).collect();
        Self {
            hostname,
            extensions,
        }
    }

    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Checks if command pipelining is supported.
    #[must_use]
    pub fn supports_pipelining(&self) -> bool {
        self.supports(&Extension::Pipelining)
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
        })
    }
}
