//! Single-writer render loop
//!
//! The send and receive paths never touch the surface. They submit
//! [`RenderRequest`]s through a [`RenderHandle`]; one blocking thread owns
//! the surface together with the row counter and the clear flag.

use std::io;

use chrono::Local;
use log::{debug, error};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::RenderSurface;
use crate::protocol::{truncate_chars, DISPLAY_LINE_LEN};

/// What a producer wants shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderRequest {
    /// A line received from the server
    Incoming(String),
    /// The local echo of a line the user just sent
    Echo(String),
    /// A system notice (disconnects, rejections)
    Notice(String),
    /// Blank the surface and restart at the top
    Clear,
    /// Reset the input prompt without adding a line
    Prompt,
}

/// Owns a surface and its cursor state
pub struct Renderer<S> {
    surface: S,
    row: usize,
    should_clear: bool,
}

impl<S: RenderSurface> Renderer<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            row: 0,
            should_clear: false,
        }
    }

    /// Next logical row to be written
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn apply(&mut self, request: RenderRequest) -> io::Result<()> {
        match request {
            RenderRequest::Incoming(line) => self.append(&line),
            RenderRequest::Echo(line) => {
                self.append(&line)?;
                self.surface.prompt()
            }
            RenderRequest::Notice(text) => self.append(&format!("*** {} ***", text)),
            RenderRequest::Clear => {
                self.row = 0;
                self.should_clear = false;
                self.surface.clear()
            }
            RenderRequest::Prompt => self.surface.prompt(),
        }
    }

    fn append(&mut self, text: &str) -> io::Result<()> {
        let text = truncate_chars(text, DISPLAY_LINE_LEN);
        self.surface.append_line(text, self.row, self.should_clear)?;
        self.should_clear = false;

        self.row += 1;
        if self.row >= self.surface.height().max(1) {
            // Wrap to the top; the next line blanks the surface once
            self.row = 0;
            self.should_clear = true;
        }
        Ok(())
    }

    pub fn into_surface(self) -> S {
        self.surface
    }
}

impl<S: RenderSurface + Send + 'static> Renderer<S> {
    /// Start the render thread.
    ///
    /// The thread exits once every [`RenderHandle`] is dropped and hands the
    /// surface back through the join handle.
    pub fn spawn(surface: S) -> (RenderHandle, JoinHandle<io::Result<S>>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = tokio::task::spawn_blocking(move || {
            let mut renderer = Renderer::new(surface);
            renderer.surface.init()?;
            while let Some(request) = rx.blocking_recv() {
                if let Err(e) = renderer.apply(request) {
                    error!("Render error: {}", e);
                    return Err(e);
                }
            }
            debug!("All render handles dropped, closing surface");
            renderer.surface.shutdown()?;
            Ok(renderer.into_surface())
        });
        (RenderHandle { tx }, task)
    }
}

/// Producer side of the render loop
#[derive(Debug, Clone)]
pub struct RenderHandle {
    tx: mpsc::UnboundedSender<RenderRequest>,
}

impl RenderHandle {
    /// A handle whose requests go to `tx`
    pub fn from_sender(tx: mpsc::UnboundedSender<RenderRequest>) -> Self {
        Self { tx }
    }

    /// Submit a request. Dropped silently if the render thread is gone.
    pub fn submit(&self, request: RenderRequest) {
        let _ = self.tx.send(request);
    }

    pub fn incoming(&self, line: impl Into<String>) {
        self.submit(RenderRequest::Incoming(line.into()));
    }

    pub fn echo(&self, line: impl Into<String>) {
        self.submit(RenderRequest::Echo(line.into()));
    }

    pub fn notice(&self, text: impl Into<String>) {
        self.submit(RenderRequest::Notice(text.into()));
    }

    pub fn clear(&self) {
        self.submit(RenderRequest::Clear);
    }

    pub fn prompt(&self) {
        self.submit(RenderRequest::Prompt);
    }
}

/// Append the local wall-clock time, `(HH:MM:SS)`
pub fn timestamped(line: &str) -> String {
    format!("{} {}", line, Local::now().format("(%H:%M:%S)"))
}
