//! Server configuration.

use crate::framing::DEFAULT_MAX_LINE_LENGTH;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio_rustls::TlsAcceptor;

/// Default ports the server listens on.
pub const DEFAULT_PORTS: [u16; 2] = [25, 587];

/// Default time sessions get to close after the shutdown broadcast.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// SMTP server configuration.
#[derive(Clone)]
pub struct Config {
    /// Addresses to listen on.
    pub listen: Vec<SocketAddr>,
    /// Acceptor for STARTTLS. `None` disables STARTTLS.
    pub tls: Option<TlsAcceptor>,
    /// Maximum length of a received line, in bytes.
    pub max_line_length: usize,
    /// Time sessions get to close after shutdown before they are aborted.
    pub shutdown_grace: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("listen", &self.listen)
            .field("tls", &self.tls.is_some())
            .field("max_line_length", &self.max_line_length)
            .field("shutdown_grace", &self.shutdown_grace)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_PORTS
                .iter()
                .map(|&port| SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
                .collect(),
            tls: None,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl Config {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Sets the listen addresses, replacing the defaults.
    #[must_use]
    pub fn listen(mut self, addrs: impl IntoIterator<Item = SocketAddr>) -> Self {
        self.config.listen = addrs.into_iter().collect();
        self
    }

    /// Enables STARTTLS with the given acceptor.
    #[must_use]
    pub fn tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.config.tls = Some(acceptor);
        self
    }

    /// Sets the maximum line length.
    #[must_use]
    pub const fn max_line_length(mut self, length: usize) -> Self {
        self.config.max_line_length = length;
        self
    }

    /// Sets the shutdown grace period.
    #[must_use]
    pub const fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen.len(), 2);
        assert_eq!(config.listen[0].port(), 25);
        assert_eq!(config.listen[1].port(), 587);
        assert!(config.tls.is_none());
        assert_eq!(config.max_line_length, 64 * 1024);
        assert_eq!(config.shutdown_grace, Duration::from_secs(1));
    }

    #[test]
    fn test_builder() {
        let addr = SocketAddr::from(([127, 0, 0, 1], 2525));
        let config = Config::builder()
            .listen([addr])
            .max_line_length(1000)
            .shutdown_grace(Duration::from_millis(50))
            .build();

        assert_eq!(config.listen, vec![addr]);
        assert_eq!(config.max_line_length, 1000);
        assert_eq!(config.shutdown_grace, Duration::from_millis(50));
    }
}
