//! Mail exchanger (MX) resolution.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::future::Future;
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;

/// Resolves a domain to the hosts that accept its mail.
pub trait MxResolver: Send + Sync {
    /// Returns mail hosts in ascending preference order.
    ///
    /// Hosts with equal preference keep their record order, trailing dots
    /// are trimmed, and a domain without MX records resolves to itself.
    fn resolve(&self, domain: &str) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Orders `(preference, host)` records for delivery.
///
/// The sort is stable, so equal preferences keep their input order.
#[must_use]
pub fn order_by_preference(
    records: impl IntoIterator<Item = (u16, String)>,
    domain: &str,
) -> Vec<String> {
    let mut records: Vec<(u16, String)> = records.into_iter().collect();
    // Sort by preference (lower is better)
    records.sort_by_key(|(preference, _)| *preference);

    let hosts: Vec<String> = records
        .into_iter()
        .map(|(_, host)| host.trim_end_matches('.').to_string())
        .filter(|host| !host.is_empty())
        .collect();

    if hosts.is_empty() {
        vec![domain.to_string()]
    } else {
        hosts
    }
}

/// MX resolver backed by DNS.
#[derive(Clone)]
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
}

impl std::fmt::Debug for DnsResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsResolver").finish_non_exhaustive()
    }
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsResolver {
    /// Creates a resolver with the default upstream configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }

    /// Creates a resolver from the system configuration (`/etc/resolv.conf`).
    ///
    /// # Errors
    ///
    /// Returns an error if the system configuration cannot be read.
    pub fn from_system_conf() -> Result<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| Error::Resolve(e.to_string()))?;
        Ok(Self { resolver })
    }
}

impl MxResolver for DnsResolver {
    async fn resolve(&self, domain: &str) -> Result<Vec<String>> {
        match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => {
                let records = lookup
                    .iter()
                    .map(|mx| (mx.preference(), mx.exchange().to_string()));
                Ok(order_by_preference(records, domain))
            }
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {
                tracing::debug!(domain, "No MX records, using the domain itself");
                Ok(vec![domain.to_string()])
            }
            Err(e) => Err(Error::Resolve(format!("{domain}: {e}"))),
        }
    }
}

/// Resolver with a fixed table, for tests and static routing.
///
/// Unknown domains resolve to themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    routes: HashMap<String, Vec<(u16, String)>>,
}

impl StaticResolver {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an MX record for a domain.
    #[must_use]
    pub fn with_record(
        mut self,
        domain: impl Into<String>,
        preference: u16,
        host: impl Into<String>,
    ) -> Self {
        self.routes
            .entry(domain.into().to_ascii_lowercase())
            .or_default()
            .push((preference, host.into()));
        self
    }
}

impl MxResolver for StaticResolver {
    async fn resolve(&self, domain: &str) -> Result<Vec<String>> {
        let records = self
            .routes
            .get(&domain.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default();
        Ok(order_by_preference(records, domain))
    }
}
