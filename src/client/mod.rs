//! Chat client
//!
//! [`connect`] opens the connection, [`ChatSession`] runs it, and
//! [`spawn_stdin_reader`] turns terminal input into a channel the send path
//! can wait on with a timeout.

pub mod session;

use std::future::Future;
use std::io::BufRead;
use std::thread;

use log::{debug, warn};
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::render::{RenderHandle, RenderSurface, Renderer};

pub use session::{ChatSession, SessionEnd};

/// Resolve the configured server and connect to its first address
pub async fn connect(config: &ClientConfig) -> Result<TcpStream, ClientError> {
    let target = format!("{}:{}", config.server, config.port);
    let addr = lookup_host(&target)
        .await
        .map_err(|e| {
            debug!("Lookup of {} failed: {}", target, e);
            ClientError::Resolve(config.server.clone())
        })?
        .next()
        .ok_or_else(|| ClientError::Resolve(config.server.clone()))?;

    TcpStream::connect(addr)
        .await
        .map_err(|source| ClientError::Connect { addr: target, source })
}

/// Run a session against `surface` on its own render thread.
///
/// The render thread is always joined, so the surface is restored even when
/// the session fails. A session error wins over a render error.
pub async fn with_renderer<S, F, Fut>(surface: S, session: F) -> Result<SessionEnd, ClientError>
where
    S: RenderSurface + Send + 'static,
    F: FnOnce(RenderHandle) -> Fut,
    Fut: Future<Output = Result<SessionEnd, ClientError>>,
{
    let (render, render_task) = Renderer::spawn(surface);
    let result = session(render).await;

    // Finishes once the session has dropped every render handle
    let restored = render_task.await;

    let end = result?;
    restored?.map_err(|e| ClientError::Render(e.to_string()))?;
    Ok(end)
}

/// Read stdin lines on a dedicated thread.
///
/// The thread blocks on the terminal, so it is never joined; it exits on
/// end of input or once the receiver is dropped and the next line arrives.
pub fn spawn_stdin_reader(buffer: usize) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Error reading input: {}", e);
                    break;
                }
            }
        }
    });
    rx
}
