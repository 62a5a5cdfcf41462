//! Per-connection handler
//!
//! `Connecting -> Registering -> Active -> Draining -> Closed`
//!
//! Every read waits at most `poll_interval` before the shutdown flag is
//! checked again. Read errors end the session exactly like a peer close.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::broadcast::broadcast;
use super::registry::{Registry, Session};
use crate::codec::{encode_frame, FrameReader};
use crate::protocol::{parse_registration, ChatFrame, DisplayName, Handle, REJECT_FULL};
use crate::shutdown::ShutdownSignal;

/// Handler lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Connecting,
    Registering,
    Active,
    Draining,
    Closed,
}

/// Shared state every handler needs
#[derive(Clone)]
pub struct HandlerContext {
    pub registry: Arc<Registry>,
    pub shutdown: ShutdownSignal,
    /// Fire `shutdown` when the registry goes from non-empty to empty
    pub shutdown_on_empty: bool,
    pub poll_interval: Duration,
    /// How long a closing session waits for its queued output to flush
    pub drain_timeout: Duration,
}

/// How a handler finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerExit {
    pub state: HandlerState,
    /// This session's leave emptied the registry and fired the shutdown signal
    pub fired_shutdown: bool,
}

/// One accepted connection
pub struct ClientHandler {
    handle: Handle,
    remote_address: String,
    ctx: HandlerContext,
    state: HandlerState,
}

impl ClientHandler {
    pub fn new(peer: SocketAddr, ctx: HandlerContext) -> Self {
        Self {
            handle: Handle::next(),
            remote_address: peer.ip().to_string(),
            ctx,
            state: HandlerState::Connecting,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    /// Drive the connection to completion
    pub async fn run(self, stream: TcpStream) -> HandlerExit {
        let (reader, writer) = stream.into_split();
        self.run_split(reader, writer).await
    }

    /// Drive a connection given as separate read and write halves
    pub async fn run_split<R, W>(mut self, reader: R, writer: W) -> HandlerExit
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut frames = FrameReader::new(reader);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let write_handle = tokio::spawn(write_loop(writer, out_rx, self.handle));

        self.transition(HandlerState::Registering);
        let Some(first) = self.read_frame(&mut frames).await else {
            drop(out_tx);
            return self.close(write_handle, false).await;
        };

        // The first frame is consumed whether or not it was a registration
        let display_name = match parse_registration(&first) {
            Some(name) => {
                info!("User registered: {} (IP: {})", name, self.remote_address);
                name
            }
            None => {
                info!("Unregistered client from {}, using anonymous identity", self.remote_address);
                DisplayName::anonymous()
            }
        };

        let session = Session::new(
            self.handle,
            self.remote_address.clone(),
            display_name.clone(),
            out_tx.clone(),
        );
        if let Err(e) = self.ctx.registry.add(session).await {
            info!("Rejecting {} from {}: {}", display_name, self.remote_address, e);
            let _ = out_tx.send(encode_frame(REJECT_FULL));
            drop(out_tx);
            return self.close(write_handle, false).await;
        }
        // The registry's copy of the sender now owns the writer's lifetime
        drop(out_tx);

        self.transition(HandlerState::Active);
        while let Some(frame) = self.read_frame(&mut frames).await {
            match ChatFrame::parse(&frame) {
                ChatFrame::Quit => {
                    debug!("{} sent quit", display_name);
                    break;
                }
                ChatFrame::Message(text) => {
                    debug!("Message from {}: {}", display_name, text);
                    let report = broadcast(&self.ctx.registry, self.handle, text).await;
                    debug!("Delivered to {}, {} gone", report.delivered, report.gone);
                }
            }
        }

        self.transition(HandlerState::Draining);
        let removal = self.ctx.registry.remove(self.handle).await;
        info!("User leave: {} (IP: {})", display_name, self.remote_address);
        let fired_shutdown =
            removal.emptied() && self.ctx.shutdown_on_empty && self.ctx.shutdown.trigger();
        if fired_shutdown {
            info!("Registry is empty, server shutdown");
        }

        self.close(write_handle, fired_shutdown).await
    }

    /// Let the writer flush what is queued, then drop the connection.
    /// A peer that stopped reading gets cut off after `drain_timeout`.
    async fn close(mut self, mut write_handle: JoinHandle<()>, fired_shutdown: bool) -> HandlerExit {
        if tokio::time::timeout(self.ctx.drain_timeout, &mut write_handle)
            .await
            .is_err()
        {
            warn!("Session {} output stalled, dropping unsent frames", self.handle);
            write_handle.abort();
        }
        self.transition(HandlerState::Closed);
        HandlerExit {
            state: self.state,
            fired_shutdown,
        }
    }

    /// Next frame, or `None` once the session should end
    async fn read_frame<R>(&self, frames: &mut FrameReader<R>) -> Option<String>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            if self.ctx.shutdown.is_triggered() {
                debug!("Session {} stopping for shutdown", self.handle);
                return None;
            }

            match tokio::time::timeout(self.ctx.poll_interval, frames.next_frame()).await {
                Err(_) => continue,
                Ok(Ok(Some(frame))) => return Some(frame),
                Ok(Ok(None)) => {
                    info!("Client {} disconnected", self.remote_address);
                    return None;
                }
                Ok(Err(e)) => {
                    warn!("Error reading from {}: {}", self.remote_address, e);
                    return None;
                }
            }
        }
    }

    fn transition(&mut self, next: HandlerState) {
        debug!("Session {}: {:?} -> {:?}", self.handle, self.state, next);
        self.state = next;
    }
}

/// Write queued frames until every sender is dropped
async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Bytes>, handle: Handle)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            debug!("Session {} write error: {}", handle, e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}
