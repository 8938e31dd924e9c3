//! SMTP server: listeners, sessions and shutdown.
//!
//! [`Server::start`] binds every configured address and serves each accepted
//! connection on its own task. What the server accepts and where finished
//! mail goes is decided by a [`Policy`].
//!
//! # Example
//!
//! ```no_run
//! use courier_smtp::server::{Config, Policy, Server, SessionInfo};
//! use courier_smtp::Mail;
//! use std::sync::Arc;
//!
//! struct Sink;
//!
//! impl Policy for Sink {
//!     fn hostname(&self, _session: &SessionInfo) -> String {
//!         "mx.example.com".into()
//!     }
//!
//!     fn on_mail_composed(&self, _session: &SessionInfo, mail: Mail) -> bool {
//!         println!("{} recipients", mail.recipients().len());
//!         true
//!     }
//! }
//!
//! # async fn run() -> courier_smtp::Result<()> {
//! let server = Server::start(Config::default(), Arc::new(Sink)).await?;
//! tokio::signal::ctrl_c().await?;
//! server.shutdown(true).await;
//! # Ok(())
//! # }
//! ```

mod config;
mod policy;
mod registry;
mod session;
pub mod tls;
mod transport;

pub use config::{Config, ConfigBuilder, DEFAULT_PORTS, DEFAULT_SHUTDOWN_GRACE};
pub use policy::{Policy, SessionInfo};

use crate::error::{Error, Result};
use registry::Registry;
use session::{Session, SessionContext};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;

/// Interval at which shutdown checks whether sessions have closed.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A running SMTP server.
pub struct Server {
    local_addrs: Vec<SocketAddr>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
    registry: Arc<Registry>,
    shutdown: watch::Sender<bool>,
    grace: Duration,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addrs", &self.local_addrs)
            .field("online", &self.is_online())
            .field("sessions", &self.session_count())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Binds all listen addresses and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Returns an error if no address is configured or binding fails. Any
    /// listener already started is stopped again.
    pub async fn start(config: Config, policy: Arc<dyn Policy>) -> Result<Self> {
        if config.listen.is_empty() {
            return Err(Error::InvalidState("No address to listen on".into()));
        }

        let mut bound = Vec::with_capacity(config.listen.len());
        for addr in &config.listen {
            tracing::info!(%addr, "Binding");
            bound.push(TcpListener::bind(*addr).await?);
        }

        let context = Arc::new(SessionContext {
            policy,
            tls: config.tls,
            max_line_length: config.max_line_length,
        });
        let registry = Arc::new(Registry::default());
        let (shutdown, _) = watch::channel(false);

        let mut local_addrs = Vec::with_capacity(bound.len());
        let mut listeners = Vec::with_capacity(bound.len());
        for listener in bound {
            let addr = listener.local_addr()?;
            local_addrs.push(addr);
            listeners.push(tokio::spawn(accept_loop(
                listener,
                Arc::clone(&context),
                Arc::clone(&registry),
                shutdown.subscribe(),
            )));
            tracing::info!(%addr, tls = context.tls.is_some(), "SMTP server listening");
        }

        tracing::info!("SMTP server started");
        Ok(Self {
            local_addrs,
            listeners: Mutex::new(listeners),
            registry,
            shutdown,
            grace: config.shutdown_grace,
        })
    }

    /// Returns the bound addresses, in configuration order.
    #[must_use]
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    /// Returns true while the server accepts connections.
    #[must_use]
    pub fn is_online(&self) -> bool {
        !self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Returns the number of open sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Stops accepting connections and, with `close_sessions`, ends every
    /// open session.
    ///
    /// Sessions are sent 421 and get the configured grace period to close
    /// before their tasks are aborted.
    pub async fn shutdown(&self, close_sessions: bool) {
        let listeners: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if !listeners.is_empty() {
            tracing::info!("Stopping listeners");
            for listener in listeners {
                listener.abort();
            }
        }

        if !close_sessions {
            return;
        }

        tracing::info!(sessions = self.registry.len(), "Closing sessions");
        self.shutdown.send_replace(true);

        let deadline = Instant::now() + self.grace;
        while !self.registry.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }

        let aborted = self.registry.abort_all();
        if aborted > 0 {
            tracing::warn!(aborted, "Sessions did not close within the grace period");
        }
        tracing::info!("SMTP server stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    context: Arc<SessionContext>,
    registry: Arc<Registry>,
    shutdown: watch::Receiver<bool>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                if !context.policy.is_connection_accepted(peer) {
                    tracing::warn!(%peer, "Connection refused by policy");
                    continue;
                }
                spawn_session(stream, peer, &context, &registry, &shutdown);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to accept connection");
            }
        }
    }
}

fn spawn_session(
    stream: TcpStream,
    peer: SocketAddr,
    context: &Arc<SessionContext>,
    registry: &Arc<Registry>,
    shutdown: &watch::Receiver<bool>,
) {
    let session = Session::new(stream, peer, Arc::clone(context), shutdown.clone());
    let span = tracing::info_span!("smtp_session", peer = %peer);
    let owner = Arc::clone(registry);

    registry.register(peer, move |id| {
        tokio::spawn(
            async move {
                tracing::debug!("Session started");
                if let Err(e) = session.run().await {
                    tracing::debug!(error = %e, "Session ended with error");
                }
                owner.remove(id);
            }
            .instrument(span),
        )
        .abort_handle()
    });
}
