//! Dual-channel client session
//!
//! Two tasks share one connection:
//! - send path: local input -> server, plus an immediate local echo
//! - receive path: server -> timestamped lines on the render surface
//!
//! Either path can end the session by clearing the shared `running` flag;
//! the other sees it within one poll interval. Neither touches the surface
//! directly, both go through a [`RenderHandle`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::codec::{encode_frame, FrameReader};
use crate::error::ClientError;
use crate::protocol::{
    format_line, is_quit_sentinel, registration_frame, split_message, truncate_chars, Direction,
    DisplayName, ServerFrame, MAX_INPUT_LEN, QUIT_SENTINEL,
};
use crate::render::{timestamped, RenderHandle};

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user typed the quit sentinel
    UserQuit,
    /// Local input reached end of file
    InputClosed,
    /// The server closed the connection
    ServerClosed,
    /// The server refused the registration, then closed
    Rejected,
    /// An I/O error on the connection
    Error(String),
}

/// One client connection to the chat server
pub struct ChatSession {
    name: DisplayName,
    poll_interval: Duration,
}

impl ChatSession {
    pub fn new(name: DisplayName, poll_interval: Duration) -> Self {
        Self {
            name,
            poll_interval,
        }
    }

    /// Register and run both paths over `stream` until either ends the session
    pub async fn run(
        self,
        stream: TcpStream,
        input: mpsc::Receiver<String>,
        render: RenderHandle,
    ) -> Result<SessionEnd, ClientError> {
        let local_address = stream.local_addr()?.ip().to_string();
        let (reader, writer) = stream.into_split();
        self.run_split(reader, writer, local_address, input, render).await
    }

    /// Same as [`ChatSession::run`] over separate halves
    pub async fn run_split<R, W>(
        self,
        reader: R,
        mut writer: W,
        local_address: String,
        input: mpsc::Receiver<String>,
        render: RenderHandle,
    ) -> Result<SessionEnd, ClientError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        writer
            .write_all(&encode_frame(&registration_frame(&self.name)))
            .await?;
        info!("Registered with server as {}", self.name);

        let running = Arc::new(AtomicBool::new(true));

        let send = tokio::spawn(send_path(
            writer,
            input,
            render.clone(),
            running.clone(),
            LocalIdentity {
                address: local_address,
                name: self.name,
            },
            self.poll_interval,
        ));
        let receive = tokio::spawn(receive_path(
            FrameReader::new(reader),
            render,
            running,
            self.poll_interval,
        ));

        let (send, receive) = tokio::join!(send, receive);
        let (mut writer, send_end) = send?;
        let receive_end = receive?;

        let _ = writer.shutdown().await;

        let end = send_end.or(receive_end).unwrap_or(SessionEnd::UserQuit);
        info!("Session ended: {:?}", end);
        Ok(end)
    }
}

/// How the local echo labels the user's own lines
struct LocalIdentity {
    address: String,
    name: DisplayName,
}

/// Clear `running`. Returns `Some(reason)` only for the path that got there first.
fn stop(running: &AtomicBool, reason: SessionEnd) -> Option<SessionEnd> {
    if running.swap(false, Ordering::SeqCst) {
        Some(reason)
    } else {
        None
    }
}

async fn send_path<W>(
    mut writer: W,
    mut input: mpsc::Receiver<String>,
    render: RenderHandle,
    running: Arc<AtomicBool>,
    me: LocalIdentity,
    poll: Duration,
) -> (W, Option<SessionEnd>)
where
    W: AsyncWrite + Unpin,
{
    loop {
        if !running.load(Ordering::SeqCst) {
            return (writer, None);
        }

        let line = match tokio::time::timeout(poll, input.recv()).await {
            Err(_) => continue,
            Ok(None) => {
                debug!("Local input closed");
                let _ = writer.write_all(&encode_frame(QUIT_SENTINEL)).await;
                let end = stop(&running, SessionEnd::InputClosed);
                return (writer, end);
            }
            Ok(Some(line)) => line,
        };

        let line = truncate_chars(line.trim_end(), MAX_INPUT_LEN);
        if line.trim().is_empty() {
            render.prompt();
            continue;
        }

        if is_quit_sentinel(line) {
            // Sent as a disconnect request; the server never broadcasts it
            let _ = writer.write_all(&encode_frame(QUIT_SENTINEL)).await;
            let end = stop(&running, SessionEnd::UserQuit);
            return (writer, end);
        }

        // Long lines go out as several messages, each echoed as sent
        for chunk in split_message(line) {
            if let Err(e) = writer.write_all(&encode_frame(chunk)).await {
                warn!("Send failed: {}", e);
                render.notice(format!("send failed: {}", e));
                let end = stop(&running, SessionEnd::Error(e.to_string()));
                return (writer, end);
            }
            render.echo(format_line(&me.address, &me.name, Direction::Outgoing, chunk));
        }
    }
}

async fn receive_path<R>(
    mut frames: FrameReader<R>,
    render: RenderHandle,
    running: Arc<AtomicBool>,
    poll: Duration,
) -> Option<SessionEnd>
where
    R: AsyncRead + Unpin,
{
    let mut rejected = false;
    loop {
        if !running.load(Ordering::SeqCst) {
            return None;
        }

        match tokio::time::timeout(poll, frames.next_frame()).await {
            Err(_) => continue,
            Ok(Ok(Some(frame))) => match ServerFrame::parse(&frame) {
                ServerFrame::Rejected => {
                    rejected = true;
                    render.notice("server is full, connection rejected");
                }
                ServerFrame::Line(line) => render.incoming(timestamped(line)),
            },
            Ok(Ok(None)) => {
                if !running.load(Ordering::SeqCst) {
                    // We asked to leave; the close is expected
                    return None;
                }
                render.notice("server closed the connection");
                let reason = if rejected {
                    SessionEnd::Rejected
                } else {
                    SessionEnd::ServerClosed
                };
                return stop(&running, reason);
            }
            Ok(Err(e)) => {
                if !running.load(Ordering::SeqCst) {
                    return None;
                }
                render.notice(format!("error reading from server: {}", e));
                return stop(&running, SessionEnd::Error(e.to_string()));
            }
        }
    }
}
