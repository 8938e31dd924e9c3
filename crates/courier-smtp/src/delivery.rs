//! Direct delivery to the recipients' mail exchangers.
//!
//! For each recipient domain the MX hosts are tried in preference order, and
//! on each host the configured ports in order (port 465 with implicit TLS).
//! The first host that accepts a connection receives the mail. Connection
//! failures move on to the next candidate; a reply from a server, including
//! a rejection, ends the attempt for that domain.

use crate::connection::{Client, Config};
use crate::error::{Error, Result};
use crate::mail::Mail;
use crate::mx::MxResolver;
use crate::types::{Address, Reply};
use courier_mime::Content;

/// Port that expects TLS from the first byte.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Composes and delivers a single-recipient mail.
///
/// # Errors
///
/// Returns an error if no mail server is reachable or the server rejects
/// the mail.
pub async fn send_mail<R: MxResolver>(
    from: Address,
    to: Address,
    subject: &str,
    content: impl Into<Content>,
    resolver: &R,
    config: &Config,
) -> Result<Reply> {
    let mail = Mail::compose(from)
        .to(to)
        .subject(subject)
        .with_content(content);
    let mut replies = deliver(&mail, resolver, config).await?;
    replies
        .pop()
        .ok_or_else(|| Error::InvalidState("Mail has no recipients".into()))
}

/// Delivers a mail to all of its recipients, one transaction per domain.
///
/// Returns the final reply of each transaction, in the order the domains
/// first appear among the recipients.
///
/// # Errors
///
/// Returns the first error; domains after it are not attempted.
pub async fn deliver<R: MxResolver>(
    mail: &Mail,
    resolver: &R,
    config: &Config,
) -> Result<Vec<Reply>> {
    let mut replies = Vec::new();
    for (domain, recipients) in group_by_domain(mail.recipients()) {
        let hosts = resolver.resolve(&domain).await?;
        let mut client = connect_any(&domain, &hosts, config).await?;

        client.hello().await?;
        let reply = client.transact(mail, &recipients).await?;
        if let Err(e) = client.quit().await {
            tracing::debug!(%domain, error = %e, "QUIT after delivery failed");
        }

        tracing::info!(%domain, recipients = recipients.len(), "Mail delivered");
        replies.push(reply);
    }
    Ok(replies)
}

/// Connects to the first candidate that accepts a connection.
async fn connect_any(domain: &str, hosts: &[String], config: &Config) -> Result<Client> {
    for host in hosts {
        for &port in &config.ports {
            let attempt = if port == IMPLICIT_TLS_PORT {
                Client::connect_tls(host, port, config.clone()).await
            } else {
                Client::connect(host, port, config.clone()).await
            };

            match attempt {
                Ok(client) => return Ok(client),
                Err(e) if e.is_retryable() => {
                    tracing::debug!(%host, port, error = %e, "Connection failed, trying next");
                }
                Err(e) => return Err(e),
            }
        }
    }

    Err(Error::NoMailServer(domain.to_string()))
}

fn group_by_domain(recipients: &[Address]) -> Vec<(String, Vec<Address>)> {
    let mut groups: Vec<(String, Vec<Address>)> = Vec::new();
    for recipient in recipients {
        let domain = recipient.domain().to_ascii_lowercase();
        match groups.iter_mut().find(|(d, _)| *d == domain) {
            Some((_, list)) => list.push(recipient.clone()),
            None => groups.push((domain, vec![recipient.clone()])),
        }
    }
    groups
}
