//! Chat server listener
//!
//! Accepts connections and spawns a [`ClientHandler`] per connection. The
//! accept wait is bounded so the shutdown flag is seen within one poll
//! interval; the flag is the only way out of the loop.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use tokio::net::TcpListener;

use super::handler::{ClientHandler, HandlerContext};
use super::registry::Registry;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::shutdown::ShutdownSignal;

/// Chat server, not yet bound
pub struct Server {
    config: ServerConfig,
    registry: Arc<Registry>,
    shutdown: ShutdownSignal,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(Registry::new(config.capacity));
        Self {
            config,
            registry,
            shutdown: ShutdownSignal::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Bind the listening socket. Failure here is fatal.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(BoundServer {
            listener,
            ctx: HandlerContext {
                registry: self.registry,
                shutdown: self.shutdown,
                shutdown_on_empty: self.config.shutdown_on_empty,
                poll_interval: self.config.poll_interval(),
                drain_timeout: self.config.drain_timeout(),
            },
        })
    }

    /// Bind and serve until shutdown
    pub async fn run(self) -> Result<(), ServerError> {
        self.bind().await?.run().await
    }
}

/// A server with its listening socket open
pub struct BoundServer {
    listener: TcpListener,
    ctx: HandlerContext,
}

impl BoundServer {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.ctx.registry.clone()
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.ctx.shutdown.clone()
    }

    /// Accept connections until the shutdown signal fires
    pub async fn run(self) -> Result<(), ServerError> {
        info!("Server listening on {}", self.listener.local_addr()?);
        if !self.ctx.shutdown_on_empty {
            info!("Shutdown-on-empty disabled, server stays up after the last user leaves");
        }

        let poll = self.ctx.poll_interval;
        while !self.ctx.shutdown.is_triggered() {
            match tokio::time::timeout(poll, self.listener.accept()).await {
                Err(_) => continue,
                Ok(Ok((stream, peer))) => {
                    info!("Client connected from {}", peer);
                    let handler = ClientHandler::new(peer, self.ctx.clone());
                    tokio::spawn(handler.run(stream));
                }
                Ok(Err(e)) => tokio::time::sleep(accept_retry_delay(&e, poll)).await,
            }
        }

        info!("Listener stopped");
        Ok(())
    }
}

/// Log a failed accept and return how long to wait before the next one.
///
/// Never zero: errors like EMFILE persist until sessions close.
fn accept_retry_delay(e: &io::Error, poll: Duration) -> Duration {
    if is_transient(e) {
        debug!("Accept temporarily unavailable: {}", e);
    } else {
        error!("Accept error: {}", e);
    }
    poll
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1".to_string(),
            port: 0,
            poll_interval_ms: 20,
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let config = ServerConfig { port, ..local_config() };

        let result = Server::new(config).bind().await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_listener_exits_on_shutdown() {
        let server = Server::new(local_config()).bind().await.unwrap();
        let shutdown = server.shutdown_signal();
        let task = tokio::spawn(server.run());

        shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_accept_errors_always_back_off() {
        let poll = Duration::from_millis(20);
        // EMFILE
        let too_many_files = io::Error::from_raw_os_error(24);
        assert_eq!(accept_retry_delay(&too_many_files, poll), poll);
        let would_block = io::Error::from(io::ErrorKind::WouldBlock);
        assert_eq!(accept_retry_delay(&would_block, poll), poll);
    }

    #[test]
    fn test_transient_errors() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }
}
