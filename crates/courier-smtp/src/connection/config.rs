//! Client connection configuration types.

use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use std::time::Duration;
use tokio_rustls::TlsConnector;

/// STARTTLS policy for plaintext connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Upgrade with STARTTLS when the server offers it.
    #[default]
    Opportunistic,
    /// Fail unless the session ends up encrypted.
    Required,
    /// Never issue STARTTLS. **Not recommended for production.**
    Disabled,
}

/// SMTP client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Hostname announced in EHLO/HELO.
    pub client_hostname: String,
    /// STARTTLS policy.
    pub security: Security,
    /// Maximum wait for each server reply.
    pub reply_timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Ports tried in order during delivery. Port 465 uses implicit TLS.
    pub ports: Vec<u16>,
    /// TLS settings for STARTTLS and implicit TLS.
    pub tls: Arc<ClientConfig>,
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::default().build()
    }
}

impl Config {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Returns true if the session must end up encrypted.
    #[must_use]
    pub fn require_tls(&self) -> bool {
        self.security == Security::Required
    }

    /// Returns a connector for the configured TLS settings.
    #[must_use]
    pub fn tls_connector(&self) -> TlsConnector {
        TlsConnector::from(Arc::clone(&self.tls))
    }
}

/// Builder for client configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    client_hostname: String,
    security: Security,
    reply_timeout: Duration,
    connect_timeout: Duration,
    ports: Vec<u16>,
    tls: Option<Arc<ClientConfig>>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            client_hostname: "localhost".to_string(),
            security: Security::Opportunistic,
            reply_timeout: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(30),
            ports: vec![587, 25, 465],
            tls: None,
        }
    }
}

impl ConfigBuilder {
    /// Sets the hostname announced in EHLO/HELO.
    #[must_use]
    pub fn client_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.client_hostname = hostname.into();
        self
    }

    /// Sets the STARTTLS policy.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the reply timeout.
    #[must_use]
    pub const fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the delivery ports.
    #[must_use]
    pub fn ports(mut self, ports: impl Into<Vec<u16>>) -> Self {
        self.ports = ports.into();
        self
    }

    /// Sets the TLS client configuration (e.g., a custom root store).
    #[must_use]
    pub fn tls(mut self, tls: Arc<ClientConfig>) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Builds the configuration.
    ///
    /// Without explicit TLS settings the webpki root certificates are used.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            client_hostname: self.client_hostname,
            security: self.security,
            reply_timeout: self.reply_timeout,
            connect_timeout: self.connect_timeout,
            ports: self.ports,
            tls: self.tls.unwrap_or_else(default_tls_config),
        }
    }
}

/// Creates a TLS configuration with the webpki root certificates.
fn default_tls_config() -> Arc<ClientConfig> {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
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
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.client_hostname, "localhost");
        assert_eq!(config.security, Security::Opportunistic);
        assert_eq!(config.reply_timeout, Duration::from_secs(3));
        assert_eq!(config.ports, vec![587, 25, 465]);
        assert!(!config.require_tls());
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder()
            .client_hostname("client.example.com")
            .security(Security::Required)
            .reply_timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .ports([2525])
            .build();

        assert_eq!(config.client_hostname, "client.example.com");
        assert!(config.require_tls());
        assert_eq!(config.reply_timeout, Duration::from_secs(10));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.ports, vec![2525]);
    }
}
